//! # Middleware
//!
//! Middleware are ordinary [`HandlerFunc`](crate::HandlerFunc)s that call
//! [`Context::next`](crate::Context::next) to run the rest of the chain:
//!
//! - [`recovery`] turns a panic in the chain into a 500
//! - [`logger`] emits one `tracing` event per request
//! - [`error_logger`] writes recorded errors as JSON when nothing else was written
//! - [`request_id`] assigns every request an id
//! - [`basic_auth`] guards routes with HTTP Basic credentials
//! - [`Metrics`] counts requests, statuses and latency
//!
//! Attach them globally with [`Engine::use_middleware`](crate::Engine::use_middleware)
//! or per group.

mod auth;
mod logger;
mod metrics;
mod recovery;
mod request_id;

pub use auth::{basic_auth, basic_auth_for_realm, Accounts, AUTH_USER_KEY};
pub use logger::{error_logger, logger};
pub use metrics::{Metrics, MetricsSnapshot};
pub use recovery::recovery;
pub(crate) use recovery::panic_message;
pub use request_id::{request_id, RequestId, REQUEST_ID_HEADER, REQUEST_ID_KEY};
