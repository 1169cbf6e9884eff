//! Registry of active subscribers.

use crate::types::SubscriberId;
use futures_util::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{Admission, Connection, Subscriber, SubscriberState};

struct Members {
    subscribers: HashMap<SubscriberId, Subscriber>,
    /// Set by `close`; later adds are rejected.
    sealed: bool,
}

/// Thread-safe set of registered subscribers.
///
/// The lock is held only for structural changes and snapshots, never across
/// a network write or close.
pub struct SubscriberRegistry {
    members: RwLock<Members>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            members: RwLock::new(Members {
                subscribers: HashMap::new(),
                sealed: false,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Wrap a freshly accepted connection in a handle. The handle is
    /// `Connected` and receives nothing until added.
    pub fn connect(&self, connection: impl Connection, peer: Option<String>) -> Subscriber {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        Subscriber::new(id, Box::new(connection), peer)
    }

    /// Connect and add in one step.
    ///
    /// Returns `None` if the registry no longer accepts subscribers; the
    /// connection is closed in that case.
    pub async fn register(
        &self,
        connection: impl Connection,
        peer: Option<String>,
    ) -> Option<Subscriber> {
        let subscriber = self.connect(connection, peer);
        match self.add(&subscriber) {
            Admission::Added | Admission::AlreadyPresent => Some(subscriber),
            Admission::Rejected => {
                subscriber.mark_removed();
                subscriber.close_transport().await;
                None
            }
        }
    }

    /// Add a subscriber to the active set.
    ///
    /// Idempotent for a subscriber already in this registry. A removed
    /// subscriber never re-enters, and a subscriber registered elsewhere is
    /// not taken over.
    pub fn add(&self, subscriber: &Subscriber) -> Admission {
        let admission = {
            let mut members = self.members.write();
            match members.subscribers.get(&subscriber.id()) {
                Some(existing) if existing.same_as(subscriber) => Admission::AlreadyPresent,
                Some(_) => Admission::Rejected,
                None if members.sealed => Admission::Rejected,
                None => {
                    if subscriber.transition(SubscriberState::Connected, SubscriberState::Registered)
                    {
                        members.subscribers.insert(subscriber.id(), subscriber.clone());
                        Admission::Added
                    } else {
                        Admission::Rejected
                    }
                }
            }
        };

        match admission {
            Admission::Added => tracing::debug!(subscriber = %subscriber.id(), "subscriber added"),
            Admission::AlreadyPresent => {}
            Admission::Rejected => tracing::warn!(
                subscriber = %subscriber.id(),
                state = ?subscriber.state(),
                "subscriber rejected by registry"
            ),
        }
        admission
    }

    /// Remove a subscriber and close its transport.
    ///
    /// Returns `false` (and does nothing) if it is not in the active set, so
    /// removing twice closes once.
    pub async fn remove(&self, subscriber: &Subscriber) -> bool {
        let removed = {
            let mut members = self.members.write();
            match members.subscribers.get(&subscriber.id()) {
                Some(existing) if existing.same_as(subscriber) => {
                    members.subscribers.remove(&subscriber.id());
                    subscriber.mark_removed();
                    true
                }
                _ => false,
            }
        };

        if removed {
            subscriber.close_transport().await;
            tracing::debug!(subscriber = %subscriber.id(), "subscriber removed");
        }
        removed
    }

    /// Current active subscribers.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.members.read().subscribers.values().cloned().collect()
    }

    /// Remove and close every subscriber. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let drained: Vec<Subscriber> = {
            let mut members = self.members.write();
            members
                .subscribers
                .drain()
                .map(|(_, subscriber)| {
                    subscriber.mark_removed();
                    subscriber
                })
                .collect()
        };

        join_all(drained.iter().map(|subscriber| subscriber.close_transport())).await;
        drained.len()
    }

    /// Stop accepting subscribers, then clear.
    pub async fn close(&self) -> usize {
        self.members.write().sealed = true;
        let cleared = self.clear().await;
        tracing::info!(cleared, "subscriber registry closed");
        cleared
    }

    pub fn contains(&self, subscriber: &Subscriber) -> bool {
        self.members
            .read()
            .subscribers
            .get(&subscriber.id())
            .is_some_and(|existing| existing.same_as(subscriber))
    }

    pub fn len(&self) -> usize {
        self.members.read().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.members.read().sealed
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
