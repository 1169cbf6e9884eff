//! The data-source seam: anything that can produce a live change cursor.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A data source that can be watched for changes on one collection.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Open a live cursor over every change, with no server-side filtering.
    async fn watch(&self) -> Result<Box<dyn ChangeCursor>>;
}

/// A live, ordered cursor of raw change documents.
#[async_trait]
pub trait ChangeCursor: Send {
    /// Wait for the next raw change document.
    ///
    /// `Ok(None)` means the feed is exhausted. Errors are fatal to the reader.
    async fn next(&mut self) -> Result<Option<Value>>;

    /// Release the cursor. The reader calls this exactly once.
    async fn close(&mut self) -> Result<()>;
}
