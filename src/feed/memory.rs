//! In-process change source fed through a channel.

use crate::error::{HubError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::source::{ChangeCursor, ChangeSource};

type Item = std::result::Result<Value, String>;

/// Pushes raw change documents into a [`ChannelSource`].
///
/// Dropping every sender exhausts the feed.
#[derive(Clone)]
pub struct FeedSender {
    tx: UnboundedSender<Item>,
}

impl FeedSender {
    /// Queue a raw change document. Returns `false` if the cursor is gone.
    pub fn send(&self, raw: Value) -> bool {
        self.tx.send(Ok(raw)).is_ok()
    }

    /// Queue a feed-level failure, surfaced as [`HubError::Source`].
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.tx.send(Err(message.into())).is_ok()
    }
}

/// Change source backed by an unbounded channel. Can be watched once.
pub struct ChannelSource {
    rx: Mutex<Option<UnboundedReceiver<Item>>>,
    closes: Arc<AtomicUsize>,
}

impl ChannelSource {
    pub fn new() -> (FeedSender, ChannelSource) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            FeedSender { tx },
            ChannelSource {
                rx: Mutex::new(Some(rx)),
                closes: Arc::new(AtomicUsize::new(0)),
            },
        )
    }

    /// How many times a cursor of this source has been closed.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeSource for ChannelSource {
    async fn watch(&self) -> Result<Box<dyn ChangeCursor>> {
        let rx = self
            .rx
            .lock()
            .take()
            .ok_or_else(|| HubError::Source("channel source is already being watched".to_string()))?;

        Ok(Box::new(ChannelCursor {
            rx,
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct ChannelCursor {
    rx: UnboundedReceiver<Item>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl ChangeCursor for ChannelCursor {
    async fn next(&mut self) -> Result<Option<Value>> {
        match self.rx.recv().await {
            Some(Ok(raw)) => Ok(Some(raw)),
            Some(Err(message)) => Err(HubError::Source(message)),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.rx.close();
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_channel_cursor_yields_then_exhausts() {
        let (sender, source) = ChannelSource::new();
        sender.send(json!({"operationType": "insert"}));
        drop(sender);

        let mut cursor = source.watch().await.unwrap();
        assert_eq!(
            cursor.next().await.unwrap(),
            Some(json!({"operationType": "insert"}))
        );
        assert_eq!(cursor.next().await.unwrap(), None);

        cursor.close().await.unwrap();
        assert_eq!(source.close_count(), 1);
    }

    #[tokio::test]
    async fn test_channel_source_watch_once() {
        let (_sender, source) = ChannelSource::new();
        let _cursor = source.watch().await.unwrap();
        assert!(matches!(source.watch().await, Err(HubError::Source(_))));
    }

    #[tokio::test]
    async fn test_fail_surfaces_source_error() {
        let (sender, source) = ChannelSource::new();
        sender.fail("connection lost");

        let mut cursor = source.watch().await.unwrap();
        match cursor.next().await {
            Err(HubError::Source(message)) => assert_eq!(message, "connection lost"),
            other => panic!("Expected source error, got {:?}", other),
        }
    }
}
