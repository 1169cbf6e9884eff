//! Change feed reader: pull, classify, dispatch.

use crate::broadcast::Dispatcher;
use crate::error::Result;
use crate::projector::Projector;
use crate::types::ChangeKind;
use tokio_util::sync::CancellationToken;

use super::record::ChangeRecord;
use super::source::{ChangeCursor, ChangeSource};

/// Why the reader loop ended without an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedExit {
    /// The cursor ran out of records.
    Exhausted,
    /// The stop signal fired.
    Stopped,
}

/// Counters for one run of the reader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Raw records pulled from the cursor.
    pub received: u64,
    /// Records broadcast to subscribers.
    pub dispatched: u64,
    /// Records of ignored operation types.
    pub ignored: u64,
    /// Insert/update records with no allow-listed field, when skipping those.
    pub skipped_empty: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedSummary {
    pub exit: FeedExit,
    pub stats: FeedStats,
}

/// Consumes a change source and hands every insert and update to the
/// dispatcher.
pub struct FeedReader {
    projector: Projector,
    dispatcher: Dispatcher,
    skip_empty: bool,
}

impl FeedReader {
    pub fn new(projector: Projector, dispatcher: Dispatcher) -> Self {
        Self {
            projector,
            dispatcher,
            skip_empty: false,
        }
    }

    /// Do not broadcast projections with no fields.
    pub fn skip_empty(mut self, skip: bool) -> Self {
        self.skip_empty = skip;
        self
    }

    /// Watch `source` until it is exhausted, fails, or `stop` fires.
    ///
    /// The cursor is closed exactly once on every path. Decode and transport
    /// errors are returned; nothing is retried.
    pub async fn run(
        &self,
        source: &dyn ChangeSource,
        stop: CancellationToken,
    ) -> Result<FeedSummary> {
        let mut cursor = source.watch().await?;
        tracing::info!(fields = %self.projector.fields(), "change feed opened");

        let mut stats = FeedStats::default();
        let outcome = self.pump(cursor.as_mut(), &stop, &mut stats).await;
        let closed = cursor.close().await;

        match (&outcome, closed) {
            (Ok(exit), Ok(())) => {
                tracing::info!(?exit, ?stats, "change feed closed");
            }
            (Ok(_), Err(e)) => {
                tracing::error!(error = %e, "failed to close change cursor");
                return Err(e);
            }
            (Err(e), close_result) => {
                tracing::error!(error = %e, ?stats, "change feed failed");
                if let Err(close_err) = close_result {
                    tracing::warn!(error = %close_err, "failed to close change cursor");
                }
            }
        }

        outcome.map(|exit| FeedSummary { exit, stats })
    }

    async fn pump(
        &self,
        cursor: &mut dyn ChangeCursor,
        stop: &CancellationToken,
        stats: &mut FeedStats,
    ) -> Result<FeedExit> {
        loop {
            let next = tokio::select! {
                biased;
                _ = stop.cancelled() => return Ok(FeedExit::Stopped),
                next = cursor.next() => next?,
            };

            let Some(raw) = next else {
                return Ok(FeedExit::Exhausted);
            };
            stats.received += 1;

            let record = ChangeRecord::decode(raw)?;
            let (event, kind) = self.projector.project(&record);

            if !kind.is_broadcast() {
                tracing::debug!(operation = record.operation_type(), "ignoring change");
                stats.ignored += 1;
                continue;
            }
            if event.is_empty() && self.skip_empty {
                tracing::debug!(%kind, "no configured fields changed, skipping");
                stats.skipped_empty += 1;
                continue;
            }

            let payload = event.to_payload()?;
            tracing::debug!(%kind, fields = event.len(), "broadcasting change");
            // In-flight dispatches run to completion; the stop signal is
            // checked before the next pull.
            self.dispatcher.dispatch(&payload).await;
            stats.dispatched += 1;
        }
    }
}
