use anyhow::Context;
use changecast::signals::wait_for_shutdown_signal;
use changecast::{ChangeSource, FeedExit, Hub, JsonLinesSource, Settings, SourceKind};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment and flags still apply.
    let _ = dotenvy::dotenv();
    let settings = Settings::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    settings.validate()?;

    let source = open_source(&settings).await?;
    let listener = TcpListener::bind(&settings.listen)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen))?;

    let hub = Hub::new(settings.hub_config());
    let running = hub.start(listener, &settings.endpoint, source)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %running.local_addr(),
        endpoint = %settings.endpoint,
        fields = %settings.fields,
        "changecast started"
    );

    tokio::select! {
        signal = wait_for_shutdown_signal() => match signal {
            Ok(()) => tracing::info!("shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signals"),
        },
        _ = running.stopped() => {}
    }

    let summary = running.shutdown().await?;
    match summary.exit {
        FeedExit::Stopped => {
            tracing::info!(stats = ?summary.stats, "changecast stopped gracefully");
            Ok(())
        }
        FeedExit::Exhausted => {
            anyhow::bail!("change feed ended after {} records", summary.stats.received)
        }
    }
}

async fn open_source(settings: &Settings) -> anyhow::Result<Arc<dyn ChangeSource>> {
    match settings.source {
        SourceKind::Stdin => Ok(Arc::new(JsonLinesSource::stdin())),
        #[cfg(feature = "mongodb")]
        SourceKind::Mongodb => {
            let (uri, database, collection) = settings.mongodb_target()?;
            let source = changecast::MongoSource::connect(uri, database, collection)
                .await
                .context("failed to connect to mongodb")?;
            Ok(Arc::new(source))
        }
        #[cfg(not(feature = "mongodb"))]
        SourceKind::Mongodb => anyhow::bail!("built without mongodb support"),
    }
}
