//! Subscribers and the registry that owns them.
//!
//! A subscriber is one open connection eligible for broadcasts. The registry
//! is the single shared structure mutated from several tasks:
//! - the listener adds subscribers as connections are accepted
//! - each connection's read loop removes its subscriber on disconnect
//! - the dispatcher removes subscribers whose write failed
//!
//! # Example
//!
//! ```ignore
//! let registry = SubscriberRegistry::new();
//! let (conn, peer) = MemoryConnection::pair();
//!
//! let subscriber = registry.register(conn, None).await.unwrap();
//! subscriber.send(&Payload::from("{}"), None).await?;
//! registry.remove(&subscriber).await;
//! ```

mod memory;
mod registry;
mod types;

pub use memory::{MemoryConnection, MemoryPeer};
pub use registry::SubscriberRegistry;
pub use types::{Admission, Connection, Subscriber, SubscriberState};
