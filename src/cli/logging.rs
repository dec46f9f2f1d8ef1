//! Tracing setup for the command-line tool
//!
//! Console output goes to stderr so stdout stays clean for results. An
//! optional daily rolling file receives the same events.

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Keeps the file writer alive; logs are flushed when dropped
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Filter directive for `-v` repetitions; `RUST_LOG` still wins
pub fn verbosity_filter(base: &str, verbose: u8, quiet: bool) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbose {
        0 => base.to_string(),
        1 => "sim808_core=info,info".to_string(),
        2 => "sim808_core=debug,info".to_string(),
        _ => "sim808_core=trace,debug".to_string(),
    }
}

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig, verbose: u8, quiet: bool) -> Result<LoggingGuard> {
    let directive = verbosity_filter(&config.level, verbose, quiet);
    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let mut layers = Vec::new();

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let console = if config.json {
        console.json().with_filter(filter()).boxed()
    } else {
        console.with_filter(filter()).boxed()
    };
    layers.push(console);

    let mut file_guard = None;
    if config.file {
        let dir = config
            .directory
            .clone()
            .or_else(crate::config::log_dir)
            .context("no log directory configured")?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

        let appender = rolling::daily(&dir, "sim808.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter())
                .boxed(),
        );
    }

    Registry::default()
        .with(layers)
        .try_init()
        .context("logging already initialized")?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_filter() {
        assert_eq!(verbosity_filter("warn", 0, false), "warn");
        assert_eq!(verbosity_filter("warn", 2, false), "sim808_core=debug,info");
        assert_eq!(verbosity_filter("debug", 3, true), "error");
    }
}
