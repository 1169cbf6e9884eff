//! Subscriber handle and the transport seam it writes through.

use crate::error::{HubError, Result};
use crate::types::{Payload, SubscriberId};
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Write half of a subscriber's transport.
///
/// The read half stays with the task that accepted the connection.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Write one text frame.
    async fn send_text(&mut self, payload: &Payload) -> Result<()>;

    /// Close the transport. Called at most once per connection.
    async fn close(&mut self);
}

/// Lifecycle of a subscriber handle.
///
/// `Connected -> Registered -> Removed`. `Removed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriberState {
    /// Accepted but not yet in a registry.
    Connected,
    /// In a registry's active set; the only state that receives broadcasts.
    Registered,
    /// Removed after a failed write, a disconnect, or shutdown.
    Removed,
}

impl SubscriberState {
    fn to_u8(self) -> u8 {
        match self {
            SubscriberState::Connected => 0,
            SubscriberState::Registered => 1,
            SubscriberState::Removed => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => SubscriberState::Connected,
            1 => SubscriberState::Registered,
            _ => SubscriberState::Removed,
        }
    }
}

struct Shared {
    id: SubscriberId,
    peer: Option<String>,
    state: AtomicU8,
    /// Per-subscriber send lock. `None` once the transport has been closed.
    connection: Mutex<Option<Box<dyn Connection>>>,
}

/// Handle to one connected subscriber.
///
/// Clones refer to the same subscriber. Once removed, every write through any
/// clone fails with [`HubError::SubscriberRemoved`] without touching the
/// transport.
#[derive(Clone)]
pub struct Subscriber {
    inner: Arc<Shared>,
}

impl Subscriber {
    pub(crate) fn new(id: SubscriberId, connection: Box<dyn Connection>, peer: Option<String>) -> Self {
        Self {
            inner: Arc::new(Shared {
                id,
                peer,
                state: AtomicU8::new(SubscriberState::Connected.to_u8()),
                connection: Mutex::new(Some(connection)),
            }),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Remote address, if the transport reported one.
    pub fn peer(&self) -> Option<&str> {
        self.inner.peer.as_deref()
    }

    pub fn state(&self) -> SubscriberState {
        SubscriberState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Whether both handles refer to the same subscriber.
    pub fn same_as(&self, other: &Subscriber) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Write one payload, holding the send lock for the whole write so that
    /// frames to this subscriber are never interleaved or reordered.
    pub async fn send(&self, payload: &Payload, write_timeout: Option<Duration>) -> Result<()> {
        let mut slot = self.inner.connection.lock().await;

        match self.state() {
            SubscriberState::Registered => {}
            SubscriberState::Removed => return Err(HubError::SubscriberRemoved(self.id())),
            SubscriberState::Connected => {
                return Err(HubError::Transport(format!(
                    "subscriber {} is not registered",
                    self.id()
                )))
            }
        }

        let Some(connection) = slot.as_mut() else {
            return Err(HubError::SubscriberRemoved(self.id()));
        };

        match write_timeout {
            Some(limit) => tokio::time::timeout(limit, connection.send_text(payload))
                .await
                .unwrap_or(Err(HubError::WriteTimeout(limit))),
            None => connection.send_text(payload).await,
        }
    }

    /// Move from `from` to `to`. Fails if the handle is not in `from`.
    pub(crate) fn transition(&self, from: SubscriberState, to: SubscriberState) -> bool {
        self.inner
            .state
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn mark_removed(&self) {
        self.inner
            .state
            .store(SubscriberState::Removed.to_u8(), Ordering::Release);
    }

    /// Close the transport if it is still open. Returns whether this call
    /// closed it.
    pub(crate) async fn close_transport(&self) -> bool {
        let taken = self.inner.connection.lock().await.take();
        match taken {
            Some(mut connection) => {
                connection.close().await;
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id())
            .field("peer", &self.peer())
            .field("state", &self.state())
            .finish()
    }
}

/// Outcome of adding a subscriber to a registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Newly added to the active set.
    Added,
    /// Already in this registry's active set.
    AlreadyPresent,
    /// Removed, owned by another registry, or the registry is closed.
    Rejected,
}
