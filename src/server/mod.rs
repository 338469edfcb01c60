//! # Server Module
//!
//! HTTP/1.1 transport. [`HttpServer`] accepts connections with `tiny_http`
//! and hands each request, converted to an `http::Request<Vec<u8>>`, to an
//! [`HttpService`] on one of a fixed set of worker threads. The
//! [`Engine`](crate::Engine) is the usual service, but anything implementing
//! the trait can be served.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use whisk::server::HttpServer;
//! use whisk::{handlers, Context, Engine, ServerConfig};
//!
//! let mut engine = Engine::default();
//! engine.get("/", handlers![|c: &mut Context| c.string(200, "hello")]);
//!
//! let handle = HttpServer::new(Arc::new(engine), ServerConfig::from_env())
//!     .start("127.0.0.1:8080")?;
//! handle.wait_ready()?;
//! handle.join().ok();
//! # Ok::<(), std::io::Error>(())
//! ```

mod http_server;
mod request;
mod response;

pub use http_server::{HttpServer, ServerHandle};

use http::{Request, Response};

/// Something that turns one request into one response.
pub trait HttpService: Send + Sync + 'static {
    fn call(&self, request: Request<Vec<u8>>) -> Response<Vec<u8>>;
}
