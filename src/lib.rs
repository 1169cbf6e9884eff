//! # Changecast
//!
//! Relays change events from a document database's change feed to live
//! WebSocket subscribers, projecting each event down to a configured set of
//! fields before fan-out.
//!
//! ## Core Concepts
//!
//! - **Change feed**: a live, ordered cursor of change records for one collection
//! - **Projection**: inserts and updates reduced to the configured fields
//! - **Registry**: the set of connected subscribers, pruned on failed writes
//! - **Broadcast**: one payload written to every registered subscriber
//!
//! ## Example
//!
//! ```ignore
//! use changecast::{ChannelSource, Hub, HubConfig};
//!
//! let (feed, source) = ChannelSource::new();
//! let hub = Hub::new(HubConfig::with_fields("title,text".parse()?));
//! let running = hub.start(listener, "/listen", Arc::new(source))?;
//!
//! // Every connected subscriber receives {"title":"A","text":"B"}
//! feed.send(json!({
//!     "operationType": "insert",
//!     "fullDocument": {"title": "A", "text": "B", "extra": "C"}
//! }));
//!
//! running.shutdown().await?;
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod feed;
pub mod hub;
pub mod projector;
pub mod signals;
pub mod subscribers;
pub mod transport;
pub mod types;

// Re-exports
pub use broadcast::{DispatchReport, Dispatcher};
pub use config::{HubConfig, Settings, SourceKind};
pub use error::{HubError, Result};
#[cfg(feature = "mongodb")]
pub use feed::MongoSource;
pub use feed::{
    ChangeCursor, ChangeRecord, ChangeSource, ChannelSource, FeedExit, FeedReader, FeedSender,
    FeedStats, FeedSummary, JsonLinesSource,
};
pub use hub::{Hub, RunningHub};
pub use projector::{project, ProjectedEvent, Projector};
pub use subscribers::{
    Admission, Connection, MemoryConnection, MemoryPeer, Subscriber, SubscriberRegistry,
    SubscriberState,
};
pub use types::*;
