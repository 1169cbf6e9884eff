//! WebSocket transport: the upgrade endpoint subscribers connect to.
//!
//! Each accepted connection is split. The write half becomes a subscriber in
//! the registry; the read half stays in the connection's own task, which only
//! watches for the peer going away.

mod listener;
mod ws;

pub use listener::{router, serve};
pub use ws::WsConnection;
