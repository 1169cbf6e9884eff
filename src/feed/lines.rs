//! Change source reading newline-delimited JSON change documents.
//!
//! Lets the hub relay a change stream piped in from another process, e.g.
//! `mongosh --quiet --eval '...watch()...' | changecast --source stdin`.

use crate::error::{HubError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use super::source::{ChangeCursor, ChangeSource};

/// Reads one change document per line. Blank lines are skipped, EOF
/// exhausts the feed. Can be watched once.
pub struct JsonLinesSource<R> {
    reader: Mutex<Option<R>>,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
        }
    }
}

impl JsonLinesSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R> ChangeSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn watch(&self) -> Result<Box<dyn ChangeCursor>> {
        let reader = self
            .reader
            .lock()
            .take()
            .ok_or_else(|| HubError::Source("line source is already being watched".to_string()))?;

        Ok(Box::new(LinesCursor {
            lines: Some(reader.lines()),
            line_no: 0,
        }))
    }
}

struct LinesCursor<R> {
    lines: Option<Lines<R>>,
    line_no: u64,
}

#[async_trait]
impl<R> ChangeCursor for LinesCursor<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn next(&mut self) -> Result<Option<Value>> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };

        while let Some(line) = lines.next_line().await? {
            self.line_no += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let raw = serde_json::from_str(line).map_err(|e| {
                HubError::MalformedRecord(format!("line {}: {}", self.line_no, e))
            })?;
            return Ok(Some(raw));
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        self.lines = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_reads_documents_skipping_blank_lines() {
        let input = b"{\"operationType\":\"insert\",\"fullDocument\":{\"a\":1}}\n\n  \n{\"operationType\":\"delete\"}\n";
        let source = JsonLinesSource::new(&input[..]);

        let mut cursor = source.watch().await.unwrap();
        assert_eq!(
            cursor.next().await.unwrap(),
            Some(json!({"operationType": "insert", "fullDocument": {"a": 1}}))
        );
        assert_eq!(
            cursor.next().await.unwrap(),
            Some(json!({"operationType": "delete"}))
        );
        assert_eq!(cursor.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_line_is_malformed() {
        let source = JsonLinesSource::new(&b"{\"ok\":1}\nnot json\n"[..]);
        let mut cursor = source.watch().await.unwrap();

        assert!(cursor.next().await.unwrap().is_some());
        match cursor.next().await {
            Err(HubError::MalformedRecord(message)) => assert!(message.starts_with("line 2")),
            other => panic!("Expected malformed record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_cursor_is_exhausted() {
        let source = JsonLinesSource::new(&b"{\"ok\":1}\n"[..]);
        let mut cursor = source.watch().await.unwrap();
        cursor.close().await.unwrap();
        assert_eq!(cursor.next().await.unwrap(), None);
    }
}
