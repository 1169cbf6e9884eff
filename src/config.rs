//! Startup configuration.

use crate::error::{HubError, Result};
use crate::types::FieldSet;
use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Default bound on a single subscriber write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Hub configuration. Fixed for the lifetime of the hub.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Fields kept by projection, in wire order.
    pub fields: FieldSet,

    /// Bound on one write to one subscriber (None = wait indefinitely).
    /// Default: 10s
    pub write_timeout: Option<Duration>,

    /// Skip insert/update events whose projection has no fields.
    /// Default: false (an empty object is broadcast)
    pub skip_empty: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            fields: FieldSet::default(),
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
            skip_empty: false,
        }
    }
}

impl HubConfig {
    pub fn with_fields(fields: FieldSet) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }
}

/// Where change records come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// A MongoDB change stream (requires the `mongodb` feature).
    Mongodb,
    /// Newline-delimited JSON change documents on stdin.
    Stdin,
}

impl Default for SourceKind {
    fn default() -> Self {
        if cfg!(feature = "mongodb") {
            SourceKind::Mongodb
        } else {
            SourceKind::Stdin
        }
    }
}

/// Command-line and environment settings for the `changecast` binary.
///
/// Every option can also come from the environment (or a `.env` file).
#[derive(Clone, Debug, Parser)]
#[command(name = "changecast", version, about = "Relay document change events to WebSocket subscribers")]
pub struct Settings {
    /// Change record source.
    #[arg(long, env = "CHANGECAST_SOURCE", value_enum, default_value_t)]
    pub source: SourceKind,

    /// MongoDB connection string.
    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    /// Database holding the watched collection.
    #[arg(long, env = "MONGODB_DB")]
    pub database: Option<String>,

    /// Collection to watch.
    #[arg(long, env = "MONGODB_COLLECTION")]
    pub collection: Option<String>,

    /// Comma-separated fields to relay, in output order.
    #[arg(long, env = "CHANGECAST_FIELDS")]
    pub fields: FieldSet,

    /// Address to accept subscribers on.
    #[arg(long, env = "CHANGECAST_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: String,

    /// WebSocket upgrade path.
    #[arg(long, env = "CHANGECAST_ENDPOINT", default_value = "/listen")]
    pub endpoint: String,

    /// Per-subscriber write deadline in milliseconds; 0 disables it.
    #[arg(long, env = "CHANGECAST_WRITE_TIMEOUT_MS", default_value_t = 10_000)]
    pub write_timeout_ms: u64,

    /// Do not broadcast changes that touch none of the fields.
    #[arg(long, env = "CHANGECAST_SKIP_EMPTY")]
    pub skip_empty: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, env = "CHANGECAST_LOG", default_value = "info")]
    pub log: String,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(HubError::InvalidConfig(
                "at least one field must be configured".to_string(),
            ));
        }
        if !self.endpoint.starts_with('/') {
            return Err(HubError::InvalidConfig(format!(
                "endpoint must start with '/': {}",
                self.endpoint
            )));
        }
        if self.source == SourceKind::Mongodb {
            if !cfg!(feature = "mongodb") {
                return Err(HubError::InvalidConfig(
                    "built without mongodb support; use --source stdin".to_string(),
                ));
            }
            self.mongodb_target()?;
        }
        Ok(())
    }

    /// Connection string, database and collection for the MongoDB source.
    pub fn mongodb_target(&self) -> Result<(&str, &str, &str)> {
        Ok((
            required(&self.mongodb_uri, "MONGODB_URI")?,
            required(&self.database, "MONGODB_DB")?,
            required(&self.collection, "MONGODB_COLLECTION")?,
        ))
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            fields: self.fields.clone(),
            write_timeout: self.write_timeout(),
            skip_empty: self.skip_empty,
        }
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| HubError::InvalidConfig(format!("{name} is required for the mongodb source")))
}
