//! Change feed: sources of raw change records and the reader that relays
//! them.
//!
//! A [`ChangeSource`] opens a live [`ChangeCursor`] over one collection. The
//! [`FeedReader`] pulls from it, decodes each document into a
//! [`ChangeRecord`], projects it, and dispatches inserts and updates.
//!
//! Sources:
//! - [`ChannelSource`]: fed in-process through a [`FeedSender`]
//! - [`JsonLinesSource`]: newline-delimited JSON from stdin or any reader
//! - `MongoSource`: a MongoDB change stream (feature `mongodb`)

mod lines;
mod memory;
#[cfg(feature = "mongodb")]
mod mongo;
mod reader;
pub mod record;
mod source;

pub use lines::JsonLinesSource;
pub use memory::{ChannelSource, FeedSender};
#[cfg(feature = "mongodb")]
pub use mongo::MongoSource;
pub use reader::{FeedExit, FeedReader, FeedStats, FeedSummary};
pub use record::{ChangeRecord, Document};
pub use source::{ChangeCursor, ChangeSource};
