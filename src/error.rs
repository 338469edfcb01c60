//! Error types.
//!
//! Route registration errors are configuration errors: [`Engine::handle`]
//! panics with their message, [`Engine::try_handle`] hands them back.
//! Everything that can happen while serving a request is either turned into
//! an HTTP status by the engine or recorded on the [`Context`].
//!
//! [`Engine::handle`]: crate::Engine::handle
//! [`Engine::try_handle`]: crate::Engine::try_handle
//! [`Context`]: crate::Context

use std::fmt;
use std::io;

/// Invalid or ambiguous route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// Pattern does not begin with `/`
    MissingLeadingSlash {
        /// The rejected pattern
        pattern: String,
    },
    /// `:` or `*` without a name
    EmptyWildcardName {
        /// The rejected pattern
        pattern: String,
    },
    /// More than one wildcard in a single path segment (e.g. `/:a:b`)
    MultipleWildcardsInSegment {
        /// The rejected pattern
        pattern: String,
    },
    /// Catch-all followed by more segments
    CatchAllNotAtEnd {
        /// The rejected pattern
        pattern: String,
    },
    /// Catch-all not directly preceded by `/`
    CatchAllWithoutSlash {
        /// The rejected pattern
        pattern: String,
    },
    /// A wildcard collides with a different wildcard already registered at
    /// the same position
    WildcardConflict {
        /// The rejected pattern
        pattern: String,
        /// Wildcard segment of the rejected pattern (e.g. `*path`)
        segment: String,
        /// Wildcard already registered at that position (e.g. `:id`)
        existing: String,
    },
    /// A handler chain is already registered for this exact pattern
    DuplicateRoute {
        /// The rejected pattern
        pattern: String,
    },
    /// Route registered with no handlers at all
    EmptyHandlers {
        /// The rejected pattern
        pattern: String,
    },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::MissingLeadingSlash { pattern } => {
                write!(f, "path must begin with '/' in pattern '{pattern}'")
            }
            RouteError::EmptyWildcardName { pattern } => {
                write!(f, "wildcards must be named with a non-empty name in pattern '{pattern}'")
            }
            RouteError::MultipleWildcardsInSegment { pattern } => {
                write!(f, "only one wildcard per path segment is allowed in pattern '{pattern}'")
            }
            RouteError::CatchAllNotAtEnd { pattern } => {
                write!(f, "catch-all routes are only allowed at the end of the path in pattern '{pattern}'")
            }
            RouteError::CatchAllWithoutSlash { pattern } => {
                write!(f, "no / before catch-all in pattern '{pattern}'")
            }
            RouteError::WildcardConflict {
                pattern,
                segment,
                existing,
            } => write!(
                f,
                "wildcard '{segment}' in pattern '{pattern}' conflicts with existing wildcard '{existing}'"
            ),
            RouteError::DuplicateRoute { pattern } => {
                write!(f, "a handler is already registered for pattern '{pattern}'")
            }
            RouteError::EmptyHandlers { pattern } => {
                write!(f, "there must be at least one handler for pattern '{pattern}'")
            }
        }
    }
}

impl std::error::Error for RouteError {}

/// Failure of a [`Context`](crate::Context) accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// No value stored under the key
    KeyNotFound {
        /// Requested key
        key: String,
    },
    /// A value is stored under the key, but of a different type
    TypeMismatch {
        /// Requested key
        key: String,
        /// Requested type
        expected: &'static str,
    },
    /// Request body could not be decoded into the requested type
    Bind {
        /// Decoder error message
        message: String,
    },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::KeyNotFound { key } => write!(f, "key '{key}' does not exist"),
            ContextError::TypeMismatch { key, expected } => {
                write!(f, "value stored under '{key}' is not a {expected}")
            }
            ContextError::Bind { message } => write!(f, "failed to bind request body: {message}"),
        }
    }
}

impl std::error::Error for ContextError {}

/// Failure to produce a response body.
#[derive(Debug)]
pub enum RenderError {
    /// JSON serialization failed
    Json(serde_json::Error),
    /// XML serialization failed
    Xml(String),
    /// Template missing or failed to render
    Template(String),
    /// Reading a file or template source failed
    Io(io::Error),
    /// Redirect with a non-3xx status
    InvalidRedirect {
        /// Offending status code
        status: u16,
    },
    /// Value cannot be sent as an HTTP header
    InvalidHeader {
        /// Header name
        name: &'static str,
        /// Rejected value
        value: String,
    },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Json(e) => write!(f, "json render failed: {e}"),
            RenderError::Xml(e) => write!(f, "xml render failed: {e}"),
            RenderError::Template(e) => write!(f, "template render failed: {e}"),
            RenderError::Io(e) => write!(f, "render i/o failed: {e}"),
            RenderError::InvalidRedirect { status } => {
                write!(f, "cannot redirect with status code {status}")
            }
            RenderError::InvalidHeader { name, value } => {
                write!(f, "invalid value for header {name}: {value:?}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Json(e) => Some(e),
            RenderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(e: serde_json::Error) -> Self {
        RenderError::Json(e)
    }
}

impl From<io::Error> for RenderError {
    fn from(e: io::Error) -> Self {
        RenderError::Io(e)
    }
}

impl From<minijinja::Error> for RenderError {
    fn from(e: minijinja::Error) -> Self {
        RenderError::Template(e.to_string())
    }
}

/// Invalid engine or server configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read
    Io(io::Error),
    /// Config file is not valid YAML for the expected shape
    Yaml(serde_yaml::Error),
    /// A value is out of range
    Invalid {
        /// Field name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {e}"),
            ConfigError::Yaml(e) => write!(f, "failed to parse config: {e}"),
            ConfigError::Invalid { field, reason } => {
                write!(f, "invalid config value for '{field}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Yaml(e) => Some(e),
            ConfigError::Invalid { .. } => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}
