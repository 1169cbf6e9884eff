//! The hub: ties the feed reader, dispatcher, registry and listener together
//! and owns their shared lifecycle.

use crate::broadcast::Dispatcher;
use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::feed::{ChangeSource, FeedReader, FeedSummary};
use crate::projector::Projector;
use crate::subscribers::SubscriberRegistry;
use crate::transport;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A change hub, not yet running.
///
/// # Example
///
/// ```ignore
/// let hub = Hub::new(HubConfig::with_fields("title,text".parse()?));
/// let listener = TcpListener::bind("127.0.0.1:8080").await?;
/// let running = hub.start(listener, "/listen", Arc::new(JsonLinesSource::stdin()))?;
///
/// wait_for_shutdown_signal().await?;
/// let summary = running.shutdown().await?;
/// ```
pub struct Hub {
    config: HubConfig,
    registry: Arc<SubscriberRegistry>,
    shutdown: CancellationToken,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            registry: Arc::new(SubscriberRegistry::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.registry), self.config.write_timeout)
    }

    /// Router serving the upgrade endpoint, for embedding in a larger app.
    pub fn router(&self, endpoint: &str) -> Result<Router> {
        transport::router(endpoint, Arc::clone(&self.registry), self.shutdown.clone())
    }

    /// Start accepting subscribers on `listener` and relaying `source`.
    pub fn start(
        self,
        listener: TcpListener,
        endpoint: &str,
        source: Arc<dyn ChangeSource>,
    ) -> Result<RunningHub> {
        let router = self.router(endpoint)?;
        let local_addr = listener.local_addr()?;

        let reader = FeedReader::new(Projector::new(self.config.fields.clone()), self.dispatcher())
            .skip_empty(self.config.skip_empty);

        // Neither task restarts: when either ends, the whole hub stops.
        let feed = {
            let stop = self.shutdown.clone();
            tokio::spawn(async move {
                let result = reader.run(source.as_ref(), stop.clone()).await;
                stop.cancel();
                result
            })
        };

        let server = {
            let stop = self.shutdown.clone();
            tokio::spawn(async move {
                let result = transport::serve(listener, router, stop.clone()).await;
                stop.cancel();
                result
            })
        };

        tracing::info!(%local_addr, endpoint, "hub started");

        Ok(RunningHub {
            local_addr,
            registry: self.registry,
            shutdown: self.shutdown,
            feed,
            server,
        })
    }
}

/// A started hub.
pub struct RunningHub {
    local_addr: SocketAddr,
    registry: Arc<SubscriberRegistry>,
    shutdown: CancellationToken,
    feed: JoinHandle<Result<FeedSummary>>,
    server: JoinHandle<Result<()>>,
}

impl RunningHub {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Fire the stop signal without waiting.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves once the stop signal fired, whether from [`stop`](Self::stop)
    /// or because the feed or the listener ended.
    pub async fn stopped(&self) {
        self.shutdown.cancelled().await;
    }

    /// Stop the hub and wait for it: the feed cursor is released, the
    /// listener stops accepting, and every subscriber is closed.
    ///
    /// Returns the feed's outcome; a listener failure is returned if the feed
    /// itself ended cleanly.
    pub async fn shutdown(self) -> Result<FeedSummary> {
        self.shutdown.cancel();

        let feed = flatten(self.feed.await);
        let server = flatten(self.server.await);
        let cleared = self.registry.close().await;

        if let Err(e) = &server {
            tracing::error!(error = %e, "listener failed");
        }
        tracing::info!(cleared, "hub stopped");

        let summary = feed?;
        server?;
        Ok(summary)
    }
}

fn flatten<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    joined.map_err(HubError::from).and_then(|result| result)
}
