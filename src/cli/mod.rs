//! # CLI Module
//!
//! Command-line entry point of the `whisk` binary: a small file server that
//! doubles as a smoke test of the framework.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Serve a directory over HTTP until SIGINT or SIGTERM:
//!
//! ```bash
//! whisk serve --dir ./public --addr 0.0.0.0:8080
//! ```
//!
//! Options:
//! - `--dir <DIR>` - Directory to serve (default: `.`)
//! - `--addr <ADDR>` - Listen address (default: `127.0.0.1:8080`, env `WHISK_ADDR`)
//! - `--config <FILE>` - YAML [`EngineConfig`](crate::EngineConfig); without it the
//!   `WHISK_*` environment variables apply
//!
//! Besides the files, the server answers `GET /metrics` with Prometheus text
//! and tags every response with an `X-Request-Id`.
//!
//! ### `routes`
//!
//! Print the route table the `serve` command would register:
//!
//! ```bash
//! whisk routes --dir ./public
//! ```

mod commands;


pub use commands::{build_engine, run_cli, Cli, Commands};
