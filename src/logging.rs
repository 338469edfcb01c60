//! # Logging
//!
//! Structured logging setup for services built on whisk. The crate itself
//! only emits `tracing` events; [`init_logging`] installs a subscriber that
//! prints them as JSON lines (the default) or human-readable text.
//!
//! ## Environment Variables
//!
//! - `WHISK_LOG_LEVEL` - `trace`, `debug`, `info` (default), `warn`, `error`.
//!   `RUST_LOG`, when set, takes precedence.
//! - `WHISK_LOG_FORMAT` - `json` (default) or `pretty`
//! - `WHISK_LOG_ASYNC` - write from a background thread (default `true`)
//! - `WHISK_LOG_TARGET_FILTER` - extra comma-separated filter directives,
//!   e.g. `whisk::engine=debug,tiny_http=warn`
//! - `WHISK_LOG_INCLUDE_LOCATION` - include file and line (default `false`)
//!
//! ```rust,no_run
//! use whisk::logging::{init_logging, LogConfig};
//!
//! let _guard = init_logging(&LogConfig::from_env())?;
//! tracing::info!("service starting");
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub log_level: String,
    pub format: LogFormat,
    pub async_logging: bool,
    pub target_filter: Option<String>,
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::for_mode(Mode::Release)
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            log_level: lookup("WHISK_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: lookup("WHISK_LOG_FORMAT").map_or(defaults.format, |s| LogFormat::parse(&s)),
            async_logging: lookup("WHISK_LOG_ASYNC")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.async_logging),
            target_filter: lookup("WHISK_LOG_TARGET_FILTER").filter(|s| !s.trim().is_empty()),
            include_location: lookup("WHISK_LOG_INCLUDE_LOCATION")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.include_location),
        }
    }

    /// Presets: debug and test log verbosely in readable form, release logs
    /// JSON at `info` from a background writer.
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Debug | Mode::Test => Self {
                log_level: "debug".to_string(),
                format: LogFormat::Pretty,
                async_logging: false,
                target_filter: None,
                include_location: true,
            },
            Mode::Release => Self {
                log_level: "info".to_string(),
                format: LogFormat::Json,
                async_logging: true,
                target_filter: None,
                include_location: false,
            },
        }
    }
}

/// Keeps the background log writer alive; drop it last to flush pending
/// lines.
#[must_use = "dropping the guard stops the background log writer"]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

fn parse_level(s: &str) -> Level {
    match s.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let level = parse_level(&config.log_level);
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    if let Some(targets) = &config.target_filter {
        for directive in targets.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => eprintln!("Warning: invalid log filter directive '{directive}': {e}"),
            }
        }
    }
    filter
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    let (writer, worker) = if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        (BoxMakeWriter::new(non_blocking), Some(guard))
    } else {
        (BoxMakeWriter::new(std::io::stdout), None)
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_names(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(build_filter(config))
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(LogGuard { _worker: worker })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("other"), LogFormat::Json);
    }

    #[test]
    fn test_presets() {
        let dev = LogConfig::for_mode(Mode::Debug);
        assert_eq!(dev.format, LogFormat::Pretty);
        assert!(!dev.async_logging);
        let prod = LogConfig::default();
        assert_eq!(prod.log_level, "info");
        assert!(prod.async_logging);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("WHISK_LOG_LEVEL", "warn"),
            ("WHISK_LOG_FORMAT", "pretty"),
            ("WHISK_LOG_ASYNC", "false"),
            ("WHISK_LOG_TARGET_FILTER", " "),
        ]
        .into_iter()
        .collect();
        let config = LogConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.async_logging);
        assert_eq!(config.target_filter, None);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("TRACE"), Level::TRACE);
        assert_eq!(parse_level("bogus"), Level::INFO);
    }
}
