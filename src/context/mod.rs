//! # Request Context
//!
//! A [`Context`] carries one request through its handler chain: the parsed
//! request, the captured path parameters, the response under construction,
//! a per-request key/value store and the list of recorded errors.
//!
//! ## Chain control
//!
//! The engine starts a chain by calling [`Context::next`]. Each call runs the
//! remaining handlers in order; a middleware that calls `next()` itself gets
//! control back once everything downstream has finished:
//!
//! ```rust
//! use whisk::{Context, Flow};
//! use std::time::Instant;
//!
//! fn timing(c: &mut Context) {
//!     let start = Instant::now();
//!     if let Flow::Halted(halt) = c.next() {
//!         tracing::debug!(?halt, "chain halted");
//!     }
//!     tracing::info!(elapsed_us = start.elapsed().as_micros() as u64, "done");
//! }
//! ```
//!
//! A handler that does not call `next()` simply returns; the driver loop
//! then continues with the following handler. Only [`Context::abort`],
//! [`Context::fail`] and a recovered panic stop the chain early.
//!
//! Contexts are pooled by the engine and reset between requests, so a
//! handler must not keep references into one past its own return.

mod pool;
mod request;
mod response;
mod writer;

pub use pool::ContextPool;
pub use request::{DecodedPath, RemoteAddr};
pub use writer::ResponseWriter;

use http::{Request, StatusCode};
use serde::Serialize;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::error;

use crate::error::ContextError;
use crate::handler::{HandlerFunc, HandlersChain};
use crate::render::HtmlTemplates;
use crate::router::Params;

/// Chain position used once the chain has been stopped.
const ABORT_INDEX: usize = usize::MAX / 2;

/// Why a chain stopped before reaching its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// [`Context::abort`] with the committed status
    Aborted(StatusCode),
    /// [`Context::fail`] with the committed status
    Failed(StatusCode),
    /// A handler panicked and the panic was recovered
    Panicked,
}

/// Result of [`Context::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Every remaining handler ran
    Completed,
    /// The chain was stopped
    Halted(Halt),
}

impl Flow {
    pub fn is_completed(&self) -> bool {
        matches!(self, Flow::Completed)
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, Flow::Halted(_))
    }
}

/// Lifecycle of a handler chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// No handler has run yet
    Pending,
    /// Handlers are running
    Running,
    /// Stopped by abort, failure or panic
    Aborted,
    /// Every handler ran
    Done,
}

/// An error recorded on the context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMsg {
    pub err: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl fmt::Display for ErrorMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.err)
    }
}

type Keys = HashMap<String, Box<dyn Any + Send + Sync>>;

/// Per-request state handed to every handler.
pub struct Context {
    pub(crate) request: Request<Vec<u8>>,
    pub(crate) writer: ResponseWriter,
    pub(crate) params: Params,
    keys: Option<Keys>,
    errors: Vec<ErrorMsg>,
    handlers: HandlersChain,
    index: usize,
    halt: Option<Halt>,
    full_path: Option<Arc<str>>,
    pub(crate) templates: Option<Arc<HtmlTemplates>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("params", &self.params)
            .field("status", &self.writer.status())
            .field("index", &self.index)
            .field("halt", &self.halt)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

/// Map a numeric status onto [`StatusCode`], falling back to 500.
pub(crate) fn status_code(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or_else(|_| {
        error!(code, "Invalid HTTP status code, using 500");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

impl Context {
    /// A blank context. The engine builds these itself; this is public for
    /// exercising handlers in isolation.
    pub fn new() -> Self {
        Self {
            request: Request::default(),
            writer: ResponseWriter::default(),
            params: Params::new(),
            keys: None,
            errors: Vec::new(),
            handlers: Arc::from(Vec::new()),
            index: 0,
            halt: None,
            full_path: None,
            templates: None,
        }
    }

    /// Context for `request` with `handlers` ready to run.
    pub fn with_handlers(request: Request<Vec<u8>>, handlers: Vec<HandlerFunc>) -> Self {
        let mut c = Self::new();
        c.request = request;
        c.handlers = handlers.into();
        c
    }

    /// Return every field to its blank state.
    pub(crate) fn reset(&mut self) {
        self.request = Request::default();
        self.writer.reset();
        self.params.clear();
        self.keys = None;
        self.errors.clear();
        self.handlers = Arc::from(Vec::new());
        self.index = 0;
        self.halt = None;
        self.full_path = None;
        self.templates = None;
    }

    pub(crate) fn set_chain(&mut self, handlers: HandlersChain, params: Params, full_path: Option<Arc<str>>) {
        self.handlers = handlers;
        self.params = params;
        self.full_path = full_path;
        self.index = 0;
    }

    // ------------------------------------------------------------------
    // Chain control
    // ------------------------------------------------------------------

    /// Run the remaining handlers in order.
    ///
    /// Returns once the chain is exhausted or stopped. Calling `next()` after
    /// an abort is a no-op that reports the halt again.
    pub fn next(&mut self) -> Flow {
        let chain = Arc::clone(&self.handlers);
        while self.index < chain.len() {
            let handler = &chain[self.index];
            self.index += 1;
            handler.call(self);
        }
        self.flow()
    }

    /// Outcome of the chain so far.
    pub fn flow(&self) -> Flow {
        match self.halt {
            Some(halt) => Flow::Halted(halt),
            None => Flow::Completed,
        }
    }

    pub fn state(&self) -> ChainState {
        if self.halt.is_some() || self.index >= ABORT_INDEX {
            ChainState::Aborted
        } else if self.index == 0 {
            ChainState::Pending
        } else if self.index >= self.handlers.len() {
            ChainState::Done
        } else {
            ChainState::Running
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    pub fn halt(&self) -> Option<Halt> {
        self.halt
    }

    /// Stop the chain and commit `code` as the response status.
    ///
    /// Handlers further up the call stack still finish the code after their
    /// `next()` call. The first committed status wins: a later abort with a
    /// different code is logged and ignored.
    pub fn abort(&mut self, code: u16) {
        let code = status_code(code);
        self.writer.write_header(code);
        self.writer.write_header_now();
        self.index = ABORT_INDEX;
        if self.halt.is_none() {
            self.halt = Some(Halt::Aborted(self.writer.status()));
        }
    }

    /// Record `err` and abort with `code`.
    pub fn fail(&mut self, code: u16, err: impl fmt::Display) {
        self.error(err, None);
        self.abort(code);
        if let Some(Halt::Aborted(status)) = self.halt {
            self.halt = Some(Halt::Failed(status));
        }
    }

    /// Mark the chain as panicked and answer 500 unless a status was already
    /// committed.
    pub(crate) fn recover(&mut self) {
        self.index = ABORT_INDEX;
        self.halt = Some(Halt::Panicked);
        if !self.writer.written() {
            self.writer.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            self.writer.write_header_now();
        }
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    /// Record an error without stopping the chain.
    pub fn error(&mut self, err: impl fmt::Display, meta: Option<serde_json::Value>) {
        self.errors.push(ErrorMsg {
            err: err.to_string(),
            meta,
        });
    }

    pub fn errors(&self) -> &[ErrorMsg] {
        &self.errors
    }

    pub fn last_error(&self) -> Option<&ErrorMsg> {
        self.errors.last()
    }

    // ------------------------------------------------------------------
    // Key/value store
    // ------------------------------------------------------------------

    /// Store `value` under `key`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.keys
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), Box::new(value));
    }

    /// Value stored under `key`, whatever its type.
    ///
    /// # Errors
    ///
    /// [`ContextError::KeyNotFound`] if nothing was stored under `key`.
    pub fn get(&self, key: &str) -> Result<&(dyn Any + Send + Sync), ContextError> {
        self.keys
            .as_ref()
            .and_then(|keys| keys.get(key))
            .map(|boxed| boxed.as_ref())
            .ok_or_else(|| ContextError::KeyNotFound { key: key.to_owned() })
    }

    /// Value stored under `key` as a `T`.
    ///
    /// # Errors
    ///
    /// [`ContextError::KeyNotFound`] if nothing was stored under `key`,
    /// [`ContextError::TypeMismatch`] if the stored value is not a `T`.
    pub fn get_as<T: Any>(&self, key: &str) -> Result<&T, ContextError> {
        self.get(key)?
            .downcast_ref::<T>()
            .ok_or_else(|| ContextError::TypeMismatch {
                key: key.to_owned(),
                expected: type_name::<T>(),
            })
    }

    /// Whether anything has been stored yet.
    pub fn has_keys(&self) -> bool {
        self.keys.as_ref().is_some_and(|keys| !keys.is_empty())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn request(&self) -> &Request<Vec<u8>> {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request<Vec<u8>> {
        &mut self.request
    }

    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Value of the path parameter `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.by_name(name)
    }

    /// Pattern of the matched route, e.g. `/users/:id`.
    pub fn full_path(&self) -> Option<&str> {
        self.full_path.as_deref()
    }

    /// Set the status without committing it.
    pub fn status(&mut self, code: u16) {
        self.writer.write_header(status_code(code));
    }

    /// Number of handlers in the current chain.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers;
    use std::sync::Mutex;

    fn run(handlers: Vec<HandlerFunc>) -> Context {
        let mut c = Context::with_handlers(Request::default(), handlers);
        c.next();
        c
    }

    #[test]
    fn test_keys_are_lazily_allocated() {
        let mut c = Context::new();
        assert!(c.keys.is_none());
        assert!(matches!(c.get("foo"), Err(ContextError::KeyNotFound { .. })));

        c.set("foo", "bar".to_string());
        assert!(c.keys.is_some());
        assert_eq!(c.get_as::<String>("foo").unwrap(), "bar");
    }

    #[test]
    fn test_absent_key_differs_from_stored_none() {
        let mut c = Context::new();
        c.set("maybe", Option::<u32>::None);
        assert_eq!(c.get_as::<Option<u32>>("maybe").unwrap(), &None);
        assert_eq!(
            c.get("missing").unwrap_err(),
            ContextError::KeyNotFound {
                key: "missing".into()
            }
        );
    }

    #[test]
    fn test_get_as_type_mismatch() {
        let mut c = Context::new();
        c.set("n", 7_u64);
        let err = c.get_as::<String>("n").unwrap_err();
        assert!(matches!(err, ContextError::TypeMismatch { .. }), "{err}");
    }

    #[test]
    fn test_next_runs_handlers_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, d) = (Arc::clone(&log), Arc::clone(&log), Arc::clone(&log));
        let c = run(handlers![
            move |c: &mut Context| {
                a.lock().unwrap().push("A");
                c.next();
                a.lock().unwrap().push("A'");
            },
            move |_: &mut Context| b.lock().unwrap().push("B"),
            move |_: &mut Context| d.lock().unwrap().push("C"),
        ]);
        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C", "A'"]);
        assert_eq!(c.state(), ChainState::Done);
        assert_eq!(c.flow(), Flow::Completed);
    }

    #[test]
    fn test_abort_stops_chain_and_commits_status() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, d) = (Arc::clone(&log), Arc::clone(&log), Arc::clone(&log));
        let c = run(handlers![
            move |c: &mut Context| {
                a.lock().unwrap().push("A");
                let flow = c.next();
                assert_eq!(flow, Flow::Halted(Halt::Aborted(StatusCode::FORBIDDEN)));
                a.lock().unwrap().push("A'");
            },
            move |c: &mut Context| {
                b.lock().unwrap().push("B");
                c.abort(403);
            },
            move |_: &mut Context| d.lock().unwrap().push("C"),
        ]);
        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "A'"]);
        assert_eq!(c.writer().status(), StatusCode::FORBIDDEN);
        assert!(c.writer().written());
        assert!(c.is_aborted());
        assert_eq!(c.state(), ChainState::Aborted);
    }

    #[test]
    fn test_first_committed_abort_wins() {
        let c = run(handlers![
            |c: &mut Context| {
                c.next();
                c.abort(409);
            },
            |c: &mut Context| c.abort(403),
        ]);
        assert_eq!(c.writer().status(), StatusCode::FORBIDDEN);
        assert_eq!(c.halt(), Some(Halt::Aborted(StatusCode::FORBIDDEN)));
    }

    #[test]
    fn test_fail_records_error() {
        let c = run(handlers![|c: &mut Context| c.fail(500, "boom")]);
        assert_eq!(c.writer().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(c.halt(), Some(Halt::Failed(StatusCode::INTERNAL_SERVER_ERROR)));
        assert_eq!(c.last_error().map(|e| e.err.as_str()), Some("boom"));
    }

    #[test]
    fn test_error_does_not_stop_chain() {
        let c = run(handlers![
            |c: &mut Context| c.error("first", Some(serde_json::json!({"k": 1}))),
            |c: &mut Context| c.error("second", None),
        ]);
        assert_eq!(c.errors().len(), 2);
        assert_eq!(c.flow(), Flow::Completed);
        let json = serde_json::to_string(c.errors()).unwrap();
        assert_eq!(json, r#"[{"err":"first","meta":{"k":1}},{"err":"second"}]"#);
    }

    #[test]
    fn test_next_after_abort_is_noop() {
        let c = run(handlers![
            |c: &mut Context| {
                c.abort(401);
                assert!(c.next().is_halted());
            },
            |_: &mut Context| panic!("must not run"),
        ]);
        assert_eq!(c.writer().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_non_calling_middleware_falls_through() {
        let c = run(handlers![
            |c: &mut Context| c.set("seen", true),
            |c: &mut Context| {
                let seen = *c.get_as::<bool>("seen").unwrap();
                c.string(200, if seen { "yes" } else { "no" });
            },
        ]);
        assert_eq!(c.writer().body(), b"yes");
    }

    #[test]
    fn test_state_before_running() {
        let c = Context::with_handlers(Request::default(), handlers![|_: &mut Context| {}]);
        assert_eq!(c.state(), ChainState::Pending);
    }
}
