//! Logging via the tracing crate.

use serde::{Deserialize, Serialize};
use std::io;
use tracing_subscriber::EnvFilter;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format for log.
    pub format: LoggingFormat,
    /// Filter used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LoggingFormat::Text,
            level: "info".to_string(),
        }
    }
}

/// Logging output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber. Logs go to stderr so that command
/// output on stdout stays clean.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    match config.format {
        LoggingFormat::Text => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_writer(io::stderr)
                .with_env_filter(filter)
                .with_target(false)
                .finish(),
        )?,
        LoggingFormat::Json => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_writer(io::stderr)
                .with_env_filter(filter)
                .json()
                .finish(),
        )?,
    }

    Ok(())
}
