//! Broadcast dispatcher: fan one payload out to every registered subscriber.

use crate::error::HubError;
use crate::subscribers::{Subscriber, SubscriberRegistry};
use crate::types::Payload;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Result of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscribers the payload was written to.
    pub delivered: usize,
    /// Subscribers removed because their write failed.
    pub pruned: usize,
}

/// Delivers payloads to the subscribers of one registry.
///
/// Writes to different subscribers run concurrently; writes to one subscriber
/// are serialized by its send lock. A failed write prunes that subscriber and
/// never affects delivery to the others.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<SubscriberRegistry>,
    write_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(registry: Arc<SubscriberRegistry>, write_timeout: Option<Duration>) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Deliver `payload` to everyone registered when the call starts.
    pub async fn dispatch(&self, payload: &Payload) -> DispatchReport {
        let targets = self.registry.snapshot();
        if targets.is_empty() {
            tracing::trace!("no subscribers, payload dropped");
            return DispatchReport::default();
        }

        let results = join_all(targets.iter().map(|subscriber| async move {
            let result = subscriber.send(payload, self.write_timeout).await;
            (subscriber, result)
        }))
        .await;

        let mut report = DispatchReport::default();
        let mut failed: Vec<&Subscriber> = Vec::new();

        for (subscriber, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                // Removed concurrently; nothing left to prune.
                Err(HubError::SubscriberRemoved(_)) => {}
                Err(e) => {
                    tracing::warn!(
                        subscriber = %subscriber.id(),
                        peer = subscriber.peer().unwrap_or("-"),
                        error = %e,
                        "delivery failed, pruning subscriber"
                    );
                    failed.push(subscriber);
                }
            }
        }

        for subscriber in failed {
            if self.registry.remove(subscriber).await {
                report.pruned += 1;
            }
        }

        tracing::debug!(
            delivered = report.delivered,
            pruned = report.pruned,
            bytes = payload.len(),
            "payload dispatched"
        );
        report
    }
}
