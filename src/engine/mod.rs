//! # Engine
//!
//! The [`Engine`] owns one routing tree per HTTP method, the global
//! middleware, the not-found and not-allowed chains and a pool of reusable
//! [`Context`]s. It is built mutably, then wrapped in an `Arc` and handed to
//! a transport; from then on it is shared read-only by every worker.
//!
//! ## Dispatch
//!
//! 1. Acquire a context and look the path up in the method's tree.
//! 2. On a match, run the route's chain.
//! 3. Otherwise, for methods other than `CONNECT` and paths other than `/`,
//!    try a trailing-slash redirect, then a cleaned, case-corrected path
//!    redirect (`301` for `GET`, `307` for everything else).
//! 4. Otherwise answer `405` if another method matches the path and
//!    method-not-allowed handling is enabled, else `404`. Both run the global
//!    middleware followed by the configured handlers and fall back to a plain
//!    text body when nothing was written.
//!
//! A panic anywhere in a chain is contained to its request: the response
//! becomes a `500` unless a status was already committed.
//!
//! ```rust
//! use whisk::{handlers, Context, Engine, EngineConfig};
//!
//! let mut engine = Engine::with_defaults(EngineConfig::default());
//! engine.get("/ping", handlers![|c: &mut Context| c.string(200, "pong")]);
//!
//! let mut api = engine.group("/api", handlers![]);
//! api.get("/users/:id", handlers![|c: &mut Context| {
//!     let id = c.param("id").unwrap_or_default().to_owned();
//!     c.json(200, &serde_json::json!({ "id": id }));
//! }]);
//!
//! let res = engine.serve(http::Request::get("/api/users/7").body(Vec::new()).unwrap());
//! assert_eq!(res.status(), 200);
//! ```

mod group;

pub use group::RouterGroup;

use http::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

use crate::config::{EngineConfig, Mode};
use crate::context::{Context, ContextPool, DecodedPath};
use crate::error::{RenderError, RouteError};
use crate::handler::{HandlerFunc, HandlersChain};
use crate::middleware::{logger, panic_message, recovery};
use crate::render::{self, HtmlTemplates};
use crate::router::{clean_path, Params, Tree};
use crate::server::HttpService;

const DEFAULT_404_BODY: &[u8] = b"404 page not found";
const DEFAULT_405_BODY: &[u8] = b"405 method not allowed";

/// Methods registered by [`Engine::any`].
pub(crate) const ANY_METHODS: [Method; 9] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
    Method::DELETE,
    Method::CONNECT,
    Method::TRACE,
];

struct RouteEntry {
    pattern: Arc<str>,
    handlers: HandlersChain,
}

/// One registered route, as listed by [`Engine::routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: Method,
    pub pattern: String,
    /// Length of the full chain, middleware included
    pub handlers: usize,
}

/// Router, middleware stack and dispatcher.
pub struct Engine {
    config: EngineConfig,
    trees: HashMap<Method, Tree<RouteEntry>>,
    routes: Vec<RouteInfo>,
    middleware: Vec<HandlerFunc>,
    no_route: Vec<HandlerFunc>,
    no_method: Vec<HandlerFunc>,
    all_no_route: HandlersChain,
    all_no_method: HandlersChain,
    templates: Option<Arc<HtmlTemplates>>,
    pool: ContextPool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("routes", &self.routes.len())
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

/// Join a group base path and a relative path, keeping a trailing slash the
/// relative path asked for.
pub(crate) fn join_paths(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return if base.is_empty() { "/".to_owned() } else { base.to_owned() };
    }
    clean_path(&format!("{base}/{relative}"))
}

// Shorthand registration methods, shared by `Engine` and `RouterGroup`.
macro_rules! method_shortcuts {
    ($($name:ident => $method:expr),* $(,)?) => {
        $(
            #[doc = concat!("Register a `", stringify!($name), "` route. Panics on an invalid pattern.")]
            pub fn $name(&mut self, path: &str, handlers: Vec<HandlerFunc>) -> &mut Self {
                self.handle($method, path, handlers)
            }
        )*
    };
}
pub(crate) use method_shortcuts;

impl Engine {
    /// An engine without any middleware.
    pub fn new(config: EngineConfig) -> Self {
        let pool = ContextPool::new(config.context_pool_capacity);
        Self {
            config,
            trees: HashMap::new(),
            routes: Vec::new(),
            middleware: Vec::new(),
            no_route: Vec::new(),
            no_method: Vec::new(),
            all_no_route: Arc::from(Vec::new()),
            all_no_method: Arc::from(Vec::new()),
            templates: None,
            pool,
        }
    }

    /// An engine with [`recovery`] and [`logger`] attached.
    pub fn with_defaults(config: EngineConfig) -> Self {
        let mut engine = Self::new(config);
        engine.use_middleware(vec![recovery(), logger()]);
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Append global middleware. It applies to routes registered after this
    /// call and to the not-found and not-allowed chains.
    pub fn use_middleware(&mut self, middleware: Vec<HandlerFunc>) -> &mut Self {
        self.middleware.extend(middleware);
        self.rebuild_404_handlers();
        self.rebuild_405_handlers();
        self
    }

    /// Handlers for requests no route matches.
    pub fn no_route(&mut self, handlers: Vec<HandlerFunc>) -> &mut Self {
        self.no_route = handlers;
        self.rebuild_404_handlers();
        self
    }

    /// Handlers for paths that exist under a different method.
    pub fn no_method(&mut self, handlers: Vec<HandlerFunc>) -> &mut Self {
        self.no_method = handlers;
        self.rebuild_405_handlers();
        self
    }

    fn rebuild_404_handlers(&mut self) {
        self.all_no_route = self.combine(&[], self.no_route.clone()).into();
    }

    fn rebuild_405_handlers(&mut self) {
        self.all_no_method = self.combine(&[], self.no_method.clone()).into();
    }

    fn combine(&self, group: &[HandlerFunc], handlers: Vec<HandlerFunc>) -> Vec<HandlerFunc> {
        let mut chain = Vec::with_capacity(self.middleware.len() + group.len() + handlers.len());
        chain.extend(self.middleware.iter().cloned());
        chain.extend(group.iter().cloned());
        chain.extend(handlers);
        chain
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    /// Load every template matching `pattern`. In debug mode templates are
    /// re-read on every render.
    ///
    /// # Errors
    ///
    /// Any [`RenderError`] from loading the templates.
    pub fn load_html_glob(&mut self, pattern: &str) -> Result<&mut Self, RenderError> {
        let templates = HtmlTemplates::from_glob(pattern)?;
        Ok(self.set_html_templates(templates))
    }

    /// Load the given template files.
    ///
    /// # Errors
    ///
    /// Any [`RenderError`] from loading the templates.
    pub fn load_html_files<P: AsRef<Path>>(&mut self, files: &[P]) -> Result<&mut Self, RenderError> {
        let templates = HtmlTemplates::from_files(files)?;
        Ok(self.set_html_templates(templates))
    }

    pub fn set_html_templates(&mut self, templates: HtmlTemplates) -> &mut Self {
        let reload = self.config.mode == Mode::Debug;
        self.templates = Some(Arc::new(templates.with_reload(reload)));
        self
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// A route group under `relative_path` whose routes run `handlers` first.
    pub fn group(&mut self, relative_path: &str, handlers: Vec<HandlerFunc>) -> RouterGroup<'_> {
        RouterGroup::new(self, join_paths("/", relative_path), handlers)
    }

    /// Register `handlers` for `method` and `pattern`.
    ///
    /// # Panics
    ///
    /// Panics with the [`RouteError`] message if the pattern is invalid or
    /// conflicts with an existing route. Use [`Engine::try_handle`] to get
    /// the error instead.
    pub fn handle(&mut self, method: Method, pattern: &str, handlers: Vec<HandlerFunc>) -> &mut Self {
        if let Err(e) = self.try_handle(method, pattern, handlers) {
            panic!("{e}");
        }
        self
    }

    /// Register `handlers` for `method` and `pattern`.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] if the pattern is invalid or conflicts with
    /// an existing route.
    pub fn try_handle(&mut self, method: Method, pattern: &str, handlers: Vec<HandlerFunc>) -> Result<(), RouteError> {
        self.add_route(method, pattern, &[], handlers)
    }

    pub(crate) fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        group: &[HandlerFunc],
        handlers: Vec<HandlerFunc>,
    ) -> Result<(), RouteError> {
        let chain = self.combine(group, handlers);
        if chain.is_empty() {
            return Err(RouteError::EmptyHandlers {
                pattern: pattern.to_owned(),
            });
        }
        let count = chain.len();
        let entry = RouteEntry {
            pattern: Arc::from(pattern),
            handlers: chain.into(),
        };
        self.trees.entry(method.clone()).or_default().add_route(pattern, entry)?;
        debug!(method = %method, pattern, handlers = count, "Route registered");
        self.routes.push(RouteInfo {
            method,
            pattern: pattern.to_owned(),
            handlers: count,
        });
        Ok(())
    }

    method_shortcuts! {
        get => Method::GET,
        post => Method::POST,
        put => Method::PUT,
        patch => Method::PATCH,
        delete => Method::DELETE,
        head => Method::HEAD,
        options => Method::OPTIONS,
    }

    /// Register `handlers` for every common method.
    pub fn any(&mut self, path: &str, handlers: Vec<HandlerFunc>) -> &mut Self {
        for method in ANY_METHODS {
            self.handle(method, path, handlers.clone());
        }
        self
    }

    /// Serve files below `root` at `relative_path/*filepath` for GET and HEAD.
    pub fn static_dir(&mut self, relative_path: &str, root: impl AsRef<Path>) -> &mut Self {
        self.group("/", Vec::new()).static_dir(relative_path, root);
        self
    }

    /// Every registered route in registration order.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Handle one request.
    pub fn serve(&self, request: Request<Vec<u8>>) -> Response<Vec<u8>> {
        let mut c = self.pool.acquire();
        c.request = request;
        c.templates = self.templates.clone();

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(&mut c))) {
            error!(
                method = %c.request.method(),
                path = %c.request.uri().path(),
                panic = %panic_message(payload.as_ref()),
                "Handler panicked outside recovery middleware"
            );
            c.recover();
        }

        let response = c.writer.take_response();
        self.pool.release(c);
        response
    }

    fn dispatch(&self, c: &mut Context) {
        let method = c.request.method().clone();
        let path = c.path().to_owned();

        if let Some(tree) = self.trees.get(&method) {
            let lookup = tree.get_value(&path);
            if let Some(entry) = lookup.value {
                c.set_chain(Arc::clone(&entry.handlers), lookup.params, Some(Arc::clone(&entry.pattern)));
                c.next();
                c.writer.write_header_now();
                return;
            }
            if method != Method::CONNECT && path != "/" {
                if lookup.tsr && self.config.redirect_trailing_slash {
                    self.redirect_trailing_slash(c, &path);
                    return;
                }
                if self.config.redirect_fixed_path && self.redirect_fixed_path(c, tree, &path) {
                    return;
                }
            }
        }

        if self.config.handle_method_not_allowed {
            let mut allowed: Vec<&str> = self
                .trees
                .iter()
                .filter(|(m, tree)| **m != method && tree.get_value(&path).value.is_some())
                .map(|(m, _)| m.as_str())
                .collect();
            if !allowed.is_empty() {
                allowed.sort_unstable();
                if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                    c.writer.set_header(ALLOW, value);
                }
                let chain = Arc::clone(&self.all_no_method);
                serve_error(c, StatusCode::METHOD_NOT_ALLOWED, chain, DEFAULT_405_BODY);
                return;
            }
        }

        serve_error(c, StatusCode::NOT_FOUND, Arc::clone(&self.all_no_route), DEFAULT_404_BODY);
    }

    fn redirect_trailing_slash(&self, c: &mut Context, path: &str) {
        let target = match path.strip_suffix('/') {
            Some(stripped) if !stripped.is_empty() => stripped.to_owned(),
            _ => format!("{path}/"),
        };
        redirect_request(c, &target);
    }

    fn redirect_fixed_path(&self, c: &mut Context, tree: &Tree<RouteEntry>, path: &str) -> bool {
        let cleaned = clean_path(path);
        match tree.find_case_insensitive_path(&cleaned, self.config.redirect_trailing_slash) {
            Some(fixed) => {
                redirect_request(c, &fixed);
                true
            }
            None => false,
        }
    }
}

/// Percent-encode each segment of a decoded path, keeping the `/`
/// separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// Redirect to `target`, keeping the query string. GET gets 301, everything
/// else 307 so the method and body are replayed.
///
/// `target` is in the same form as [`Context::path`]; a decoded path is
/// encoded again before it goes into `Location`.
fn redirect_request(c: &mut Context, target: &str) {
    let code = if *c.request.method() == Method::GET { 301 } else { 307 };
    let target = if c.request.extensions().get::<DecodedPath>().is_some() {
        encode_path(target)
    } else {
        target.to_owned()
    };
    let location = match c.request.uri().query() {
        Some(query) => format!("{target}?{query}"),
        None => target,
    };
    debug!(
        code,
        from = %c.request.uri().path(),
        to = %location,
        "Redirecting request"
    );
    c.redirect(code, &location);
}

/// Run an error chain with `status` preset and write the default body if the
/// chain left the response untouched.
fn serve_error(c: &mut Context, status: StatusCode, chain: HandlersChain, default_body: &[u8]) {
    c.set_chain(chain, Params::new(), None);
    c.writer.write_header(status);
    c.next();
    if c.writer.written() {
        return;
    }
    if c.writer.status() == status {
        c.writer
            .set_header(CONTENT_TYPE, HeaderValue::from_static(render::MIME_PLAIN));
        c.writer.write_bytes(default_body);
        return;
    }
    c.writer.write_header_now();
}

impl HttpService for Engine {
    fn call(&self, request: Request<Vec<u8>>) -> Response<Vec<u8>> {
        self.serve(request)
    }
}
