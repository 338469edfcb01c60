use http::Method;
use std::path::{Path, PathBuf};

use super::{join_paths, method_shortcuts, Engine, ANY_METHODS};
use crate::context::Context;
use crate::error::RouteError;
use crate::handler::HandlerFunc;
use crate::render::map_path;

/// Routes sharing a path prefix and a middleware list.
///
/// A group borrows the engine mutably, so it lives only as long as the
/// registration code that uses it. Nested groups inherit both the prefix and
/// the middleware of their parent.
///
/// ```rust
/// use whisk::{handlers, Context, Engine};
///
/// fn auth(c: &mut Context) {
///     if c.header("authorization").is_none() {
///         c.abort(401);
///     }
/// }
///
/// let mut engine = Engine::default();
/// let mut admin = engine.group("/admin", handlers![auth]);
/// admin.get("/stats", handlers![|c: &mut Context| c.string(200, "ok")]);
/// let mut v2 = admin.group("/v2", handlers![]);
/// v2.get("/stats", handlers![|c: &mut Context| c.string(200, "ok v2")]);
///
/// let patterns: Vec<_> = engine.routes().iter().map(|r| r.pattern.as_str()).collect();
/// assert_eq!(patterns, ["/admin/stats", "/admin/v2/stats"]);
/// ```
pub struct RouterGroup<'e> {
    engine: &'e mut Engine,
    base_path: String,
    handlers: Vec<HandlerFunc>,
}

impl<'e> RouterGroup<'e> {
    pub(super) fn new(engine: &'e mut Engine, base_path: String, handlers: Vec<HandlerFunc>) -> Self {
        Self {
            engine,
            base_path,
            handlers,
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Append middleware to this group.
    pub fn use_middleware(&mut self, middleware: Vec<HandlerFunc>) -> &mut Self {
        self.handlers.extend(middleware);
        self
    }

    /// A nested group.
    pub fn group(&mut self, relative_path: &str, handlers: Vec<HandlerFunc>) -> RouterGroup<'_> {
        let base_path = join_paths(&self.base_path, relative_path);
        let mut combined = self.handlers.clone();
        combined.extend(handlers);
        RouterGroup::new(self.engine, base_path, combined)
    }

    /// Register a route relative to the group.
    ///
    /// # Errors
    ///
    /// As [`Engine::try_handle`].
    pub fn try_handle(&mut self, method: Method, relative_path: &str, handlers: Vec<HandlerFunc>) -> Result<(), RouteError> {
        let pattern = join_paths(&self.base_path, relative_path);
        self.engine.add_route(method, &pattern, &self.handlers, handlers)
    }

    /// Register a route relative to the group.
    ///
    /// # Panics
    ///
    /// As [`Engine::handle`].
    pub fn handle(&mut self, method: Method, relative_path: &str, handlers: Vec<HandlerFunc>) -> &mut Self {
        if let Err(e) = self.try_handle(method, relative_path, handlers) {
            panic!("{e}");
        }
        self
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

    pub fn any(&mut self, relative_path: &str, handlers: Vec<HandlerFunc>) -> &mut Self {
        for method in ANY_METHODS {
            self.handle(method, relative_path, handlers.clone());
        }
        self
    }

    /// Serve files below `root` for GET and HEAD at `relative_path/*filepath`.
    ///
    /// Paths escaping `root` and missing files answer 404; a directory is
    /// served through its `index.html`.
    pub fn static_dir(&mut self, relative_path: &str, root: impl AsRef<Path>) -> &mut Self {
        if relative_path.contains([':', '*']) {
            panic!("URL parameters can not be used when serving a static folder: '{relative_path}'");
        }
        let root: PathBuf = root.as_ref().to_path_buf();
        let serve = HandlerFunc::new(move |c: &mut Context| {
            let requested = c.param("filepath").unwrap_or("/").to_owned();
            match map_path(&root, &requested) {
                Some(path) => c.file(path),
                None => c.abort(404),
            }
        });
        let pattern = format!("{}/*filepath", relative_path.trim_end_matches('/'));
        self.handle(Method::GET, &pattern, vec![serve.clone()]);
        self.handle(Method::HEAD, &pattern, vec![serve]);
        self
    }
}
