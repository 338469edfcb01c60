//! # whisk
//!
//! **whisk** is a small HTTP web framework: a radix-tree router with
//! parameter and catch-all segments, middleware chains driven through a
//! per-request [`Context`], and response rendering for JSON, XML, HTML
//! templates, plain text, files, redirects and server-sent events.
//!
//! ## Overview
//!
//! ```rust
//! use whisk::{handlers, Context, Engine, EngineConfig};
//!
//! let mut engine = Engine::with_defaults(EngineConfig::default());
//! engine.get("/hello/:name", handlers![|c: &mut Context| {
//!     let name = c.param("name").unwrap_or("world").to_owned();
//!     c.string(200, format!("hello {name}"));
//! }]);
//!
//! let res = engine.serve(http::Request::get("/hello/gopher").body(Vec::new()).unwrap());
//! assert_eq!(res.body(), b"hello gopher");
//! ```
//!
//! In a service the engine is wrapped in an `Arc` and handed to
//! [`server::HttpServer`].
//!
//! ## Architecture
//!
//! - **[`router`]** - per-method radix trees, path parameters, path cleaning
//! - **[`Context`]** - request access, chain control (`next`, `abort`,
//!   `fail`), key/value store, response helpers
//! - **[`Engine`]** - route registration, groups, dispatch with redirect,
//!   404 and 405 fallbacks, context pooling
//! - **[`render`]** - response body producers behind the [`render::Render`] trait
//! - **[`middleware`]** - recovery, request logging, request ids, basic auth, metrics
//! - **[`server`]** - HTTP/1.1 transport on worker threads
//! - **[`config`]** / **[`logging`]** - engine, server and log settings from
//!   the environment or YAML
//! - **[`cli`]** - the `whisk` file server binary
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant T as HttpServer worker
//!     participant E as Engine
//!     participant P as ContextPool
//!     participant R as Tree (per method)
//!     participant H as Handler chain
//!
//!     T->>E: serve(request)
//!     E->>P: acquire()
//!     E->>R: get_value(path)
//!     alt route found
//!         R-->>E: handlers + params
//!         E->>H: next()
//!         H-->>E: Flow
//!     else trailing slash / fixed path
//!         E-->>T: 301 / 307 redirect
//!     else
//!         E->>H: 404 or 405 chain
//!     end
//!     E->>P: release()
//!     E-->>T: response
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod handler;
pub mod logging;
pub mod middleware;
pub mod render;
pub mod router;
pub mod server;

pub use config::{EngineConfig, Mode, ServerConfig};
pub use context::{ChainState, Context, ErrorMsg, Flow, Halt};
pub use engine::{Engine, RouteInfo, RouterGroup};
pub use error::{ConfigError, ContextError, RenderError, RouteError};
pub use handler::{HandlerFunc, HandlersChain, IntoHandler};
pub use router::{Param, Params};
