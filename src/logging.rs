//! Logging setup
//!
//! Logs always go to stderr. With a directory configured they also go to a
//! daily-rolling file, optionally as JSON lines. `RUST_LOG` overrides the
//! configured level.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::core::{BridgeError, BridgeResult};

/// File name prefix for rolled log files
const LOG_FILE_PREFIX: &str = "perm-bridge.log";

/// Build the filter from `RUST_LOG` or the configured level
pub fn build_filter(config: &LoggingConfig, debug: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let directive = if debug {
        format!("{},perm_bridge=debug", config.level)
    } else {
        config.level.clone()
    };
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init_logging(config: &LoggingConfig, debug: bool) -> BridgeResult<Option<WorkerGuard>> {
    let filter = build_filter(config, debug);
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = if config.json {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer().with_ansi(false).with_writer(writer).boxed()
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| BridgeError::invalid_config(format!("failed to install logger: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_raises_crate_level() {
        let config = LoggingConfig::default();
        let filter = build_filter(&config, true);
        // RUST_LOG may be set in CI, in which case it wins
        if std::env::var("RUST_LOG").is_err() {
            assert!(filter.to_string().contains("perm_bridge=debug"));
        }
    }
}
