//! # Configuration
//!
//! [`EngineConfig`] controls routing behaviour and is captured when the
//! [`Engine`](crate::Engine) is built. [`ServerConfig`] sizes the transport.
//! Both can be read from the environment; the engine config can also be
//! loaded from YAML:
//!
//! ```yaml
//! mode: release
//! redirect_trailing_slash: true
//! redirect_fixed_path: false
//! handle_method_not_allowed: true
//! context_pool_capacity: 512
//! ```
//!
//! ## Environment Variables
//!
//! | variable | field | default |
//! |---|---|---|
//! | `WHISK_MODE` | `mode` (`debug`, `release`, `test`) | `debug` |
//! | `WHISK_REDIRECT_TRAILING_SLASH` | `redirect_trailing_slash` | `true` |
//! | `WHISK_REDIRECT_FIXED_PATH` | `redirect_fixed_path` | `true` |
//! | `WHISK_HANDLE_METHOD_NOT_ALLOWED` | `handle_method_not_allowed` | `true` |
//! | `WHISK_CONTEXT_POOL_CAPACITY` | `context_pool_capacity` | `1024` |
//! | `WHISK_WORKERS` | [`ServerConfig::workers`] | available parallelism |
//! | `WHISK_STACK_SIZE` | [`ServerConfig::stack_size`], decimal or `0x` hex | `0x40000` |
//! | `WHISK_MAX_BODY_BYTES` | [`ServerConfig::max_body_bytes`] | 4 MiB |
//!
//! Unparseable values fall back to the default with a warning.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

use crate::error::ConfigError;

/// Run mode. Debug reloads templates on every render and logs route
/// registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Debug,
    Release,
    Test,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Mode::Debug),
            "release" => Ok(Mode::Release),
            "test" => Ok(Mode::Test),
            other => Err(ConfigError::Invalid {
                field: "mode",
                reason: format!("unknown mode '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Debug => "debug",
            Mode::Release => "release",
            Mode::Test => "test",
        })
    }
}

/// Routing behaviour of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: Mode,
    /// Redirect `/foo/` to `/foo` (and back) when only the other spelling
    /// is registered.
    pub redirect_trailing_slash: bool,
    /// Redirect to the cleaned, case-corrected path when one is registered.
    pub redirect_fixed_path: bool,
    /// Answer 405 instead of 404 when the path exists for another method.
    pub handle_method_not_allowed: bool,
    /// Idle contexts kept for reuse.
    pub context_pool_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Debug,
            redirect_trailing_slash: true,
            redirect_fixed_path: true,
            handle_method_not_allowed: true,
            context_pool_capacity: 1024,
        }
    }
}

fn parse_bool(field: &'static str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(field, value = raw, "Ignoring unparseable boolean");
            None
        }
    }
}

/// Decimal or `0x`-prefixed hexadecimal size.
fn parse_size(field: &'static str, raw: &str) -> Option<usize> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    };
    if parsed.is_none() {
        warn!(field, value = raw, "Ignoring unparseable size");
    }
    parsed
}

impl EngineConfig {
    /// Defaults overridden by `WHISK_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup("WHISK_MODE") {
            match raw.parse() {
                Ok(mode) => config.mode = mode,
                Err(e) => warn!(error = %e, "Ignoring WHISK_MODE"),
            }
        }
        let flags: [(&'static str, &mut bool); 3] = [
            ("WHISK_REDIRECT_TRAILING_SLASH", &mut config.redirect_trailing_slash),
            ("WHISK_REDIRECT_FIXED_PATH", &mut config.redirect_fixed_path),
            ("WHISK_HANDLE_METHOD_NOT_ALLOWED", &mut config.handle_method_not_allowed),
        ];
        for (key, slot) in flags {
            if let Some(value) = lookup(key).and_then(|raw| parse_bool(key, &raw)) {
                *slot = value;
            }
        }
        if let Some(cap) = lookup("WHISK_CONTEXT_POOL_CAPACITY")
            .and_then(|raw| parse_size("WHISK_CONTEXT_POOL_CAPACITY", &raw))
        {
            config.context_pool_capacity = cap;
        }
        config
    }

    /// Parse a YAML document; missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Yaml`] for malformed input, [`ConfigError::Invalid`]
    /// if a value fails validation.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    ///
    /// # Errors
    ///
    /// As [`EngineConfig::from_yaml_str`], plus [`ConfigError::Io`].
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Reject values no engine can work with.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context_pool_capacity > 1 << 20 {
            return Err(ConfigError::Invalid {
                field: "context_pool_capacity",
                reason: format!("{} exceeds the limit of {}", self.context_pool_capacity, 1 << 20),
            });
        }
        Ok(())
    }
}

/// Transport settings for [`HttpServer`](crate::server::HttpServer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Worker threads, each serving one request at a time
    pub workers: usize,
    /// Stack size of each worker thread in bytes
    pub stack_size: usize,
    /// Requests with a larger body are answered with 413
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(4, usize::from),
            stack_size: 0x40000,
            max_body_bytes: 4 << 20,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(n) = lookup("WHISK_WORKERS").and_then(|raw| parse_size("WHISK_WORKERS", &raw)) {
            config.workers = n.max(1);
        }
        if let Some(n) = lookup("WHISK_STACK_SIZE").and_then(|raw| parse_size("WHISK_STACK_SIZE", &raw)) {
            config.stack_size = n;
        }
        if let Some(n) =
            lookup("WHISK_MAX_BODY_BYTES").and_then(|raw| parse_size("WHISK_MAX_BODY_BYTES", &raw))
        {
            config.max_body_bytes = n;
        }
        config
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }
}
