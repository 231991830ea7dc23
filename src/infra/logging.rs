//! Structured logging setup.
//!
//! Components log through `tracing` with per-component targets so runs can
//! be filtered down to the piece under study:
//!
//! | Target | Description |
//! |--------|-------------|
//! | `hindcast::kernel` | Time advancement, stream merging |
//! | `hindcast::exchange` | Order acceptance, rejection, cancels |
//! | `hindcast::local` | Submission validation, mirror updates |
//! | `hindcast::fills` | Executions and account updates |
//! | `hindcast::depth` | Book anomalies |
//!
//! ```bash
//! # Debug only fill processing
//! RUST_LOG=hindcast::fills=debug cargo test
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable format (default for development)
    #[default]
    Pretty,
    /// JSON format (best for log aggregation)
    Json,
    /// Compact single-line format
    Compact,
}

/// Logging configuration for a backtest run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Stdout log level when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,

    /// Format for stdout logging.
    #[serde(default)]
    pub stdout_format: LogFormat,

    /// Optional directory for a daily-rotated JSON log file. `None`
    /// disables file logging.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            stdout_format: LogFormat::default(),
            log_dir: None,
        }
    }
}

impl LogConfig {
    /// Quiet config for batch runs: warnings only, no file.
    pub fn batch() -> Self {
        Self {
            level: "warn".to_string(),
            stdout_format: LogFormat::Compact,
            log_dir: None,
        }
    }
}

/// Initialize logging based on configuration.
///
/// Returns the file writer guard, which must stay alive for the duration of
/// the run when file logging is enabled.
pub fn init_logging(
    config: &LogConfig,
    env_filter_override: Option<&str>,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let base_filter = if let Some(filter) = env_filter_override {
        EnvFilter::new(filter)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    if let Some(ref log_dir) = config.log_dir {
        std::fs::create_dir_all(log_dir)?;
        let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "hindcast.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file_layer = fmt::layer().with_writer(writer).with_ansi(false).json();

        match config.stdout_format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(base_filter)
                    .with(file_layer)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Compact => {
                tracing_subscriber::registry()
                    .with(base_filter)
                    .with(file_layer)
                    .with(fmt::layer().compact())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(base_filter)
                    .with(file_layer)
                    .with(fmt::layer().with_target(false))
                    .init();
            }
        }
        Ok(Some(guard))
    } else {
        match config.stdout_format {
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .with_env_filter(base_filter)
                    .json()
                    .init();
            }
            LogFormat::Compact => {
                tracing_subscriber::fmt()
                    .with_env_filter(base_filter)
                    .compact()
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .with_env_filter(base_filter)
                    .with_target(false)
                    .init();
            }
        }
        Ok(None)
    }
}

/// Log target constants for component-specific logging.
///
/// Use these with the `target:` field in tracing macros:
/// ```ignore
/// tracing::debug!(target: targets::FILLS, id, qty, "maker fill");
/// ```
pub mod targets {
    /// Time advancement and stream merging
    pub const KERNEL: &str = "hindcast::kernel";
    /// Order acceptance, rejection, cancels
    pub const EXCHANGE: &str = "hindcast::exchange";
    /// Submission validation and mirror updates
    pub const LOCAL: &str = "hindcast::local";
    /// Executions and account updates
    pub const FILLS: &str = "hindcast::fills";
    /// Book anomalies
    pub const DEPTH: &str = "hindcast::depth";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.stdout_format, LogFormat::Pretty);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_log_format_serde() {
        let json = serde_json::to_string(&LogFormat::Json).unwrap();
        assert_eq!(json, "\"json\"");

        let parsed: LogFormat = serde_json::from_str("\"compact\"").unwrap();
        assert_eq!(parsed, LogFormat::Compact);
    }

    #[test]
    fn test_batch_config_quiet() {
        let config = LogConfig::batch();
        assert_eq!(config.level, "warn");
    }
}
