use anyhow::{Context, Result};
use time::{macros::format_description, UtcOffset};
use tracing_subscriber::{
    fmt::{format, time::OffsetTime},
    prelude::*,
    EnvFilter,
};

use crate::config::{Config, LogLevel};

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Directives used when `RUST_LOG` is unset: this crate at `level`,
/// dependencies (hyper, reqwest, axum) at `warn`.
fn default_directives(level: LogLevel) -> String {
    format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level.as_str())
}

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Installs the global subscriber: compact lines stamped with local time
/// and the worker thread id, so interleaved generation jobs stay readable.
pub fn setup_trace(config: &Config) -> Result<()> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timestamp = format_description!("[hour]:[minute]:[second].[subsecond digits:5]");
    let formatted_layer = tracing_subscriber::fmt::layer()
        .event_format(format().compact())
        .with_timer(OffsetTime::new(offset, timestamp))
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(env_filter(config.log_level))
        .with(formatted_layer)
        .try_init()
        .context("Installing the tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_stay_at_warn() {
        assert_eq!(default_directives(LogLevel::Debug), "warn,agromap=debug");
        assert_eq!(default_directives(LogLevel::Error), "warn,agromap=error");
    }
}
