//! In-process connection, for embedding the hub without a network transport.

use crate::error::{HubError, Result};
use crate::types::Payload;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::types::Connection;

#[derive(Default)]
struct PeerState {
    messages: Mutex<Vec<Payload>>,
    write_attempts: AtomicUsize,
    closes: AtomicUsize,
    fail: AtomicBool,
    stall: AtomicBool,
}

/// Connection whose frames land in memory.
pub struct MemoryConnection {
    state: Arc<PeerState>,
}

/// The receiving end of a [`MemoryConnection`].
#[derive(Clone)]
pub struct MemoryPeer {
    state: Arc<PeerState>,
}

impl MemoryConnection {
    pub fn pair() -> (MemoryConnection, MemoryPeer) {
        let state = Arc::new(PeerState::default());
        (
            MemoryConnection {
                state: Arc::clone(&state),
            },
            MemoryPeer { state },
        )
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn send_text(&mut self, payload: &Payload) -> Result<()> {
        self.state.write_attempts.fetch_add(1, Ordering::SeqCst);

        if self.state.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.state.fail.load(Ordering::SeqCst) {
            return Err(HubError::Transport("connection reset by peer".to_string()));
        }

        self.state.messages.lock().push(payload.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl MemoryPeer {
    /// Text of every frame received, in arrival order.
    pub fn messages(&self) -> Vec<String> {
        self.state
            .messages
            .lock()
            .iter()
            .map(|payload| payload.as_str().to_string())
            .collect()
    }

    pub fn received(&self) -> usize {
        self.state.messages.lock().len()
    }

    /// Writes attempted, including failed ones.
    pub fn write_attempts(&self) -> usize {
        self.state.write_attempts.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }

    /// Make every later write fail.
    pub fn fail_writes(&self) {
        self.state.fail.store(true, Ordering::SeqCst);
    }

    /// Make every later write block forever.
    pub fn stall_writes(&self) {
        self.state.stall.store(true, Ordering::SeqCst);
    }
}
