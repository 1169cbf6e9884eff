//! Error types for the change hub.

use crate::types::SubscriberId;
use std::time::Duration;
use thiserror::Error;

/// Main error type for hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data source error: {0}")]
    Source(String),

    #[error("Malformed change record: {0}")]
    MalformedRecord(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("Subscriber {0} has been removed")]
    SubscriberRemoved(SubscriberId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Task failed: {0}")]
    Task(String),
}

impl HubError {
    /// Whether this error ends the change feed pipeline.
    ///
    /// Per-subscriber failures are recoverable: the subscriber is pruned and
    /// the broadcast continues.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            HubError::Transport(_) | HubError::WriteTimeout(_) | HubError::SubscriberRemoved(_)
        )
    }
}

impl From<serde_json::Error> for HubError {
    fn from(e: serde_json::Error) -> Self {
        HubError::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for HubError {
    fn from(e: tokio::task::JoinError) -> Self {
        HubError::Task(e.to_string())
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for HubError {
    fn from(e: mongodb::error::Error) -> Self {
        HubError::Source(e.to_string())
    }
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
