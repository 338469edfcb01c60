//! Handler function types.

use std::fmt;
use std::sync::Arc;

use crate::context::Context;

/// A request handler or middleware.
///
/// Handlers and middleware share one shape: both receive the request
/// [`Context`]. Middleware calls [`Context::next`] to run the rest of the
/// chain and can inspect the outcome afterwards.
#[derive(Clone)]
pub struct HandlerFunc(Arc<dyn Fn(&mut Context) + Send + Sync>);

impl HandlerFunc {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    #[inline]
    pub fn call(&self, c: &mut Context) {
        (self.0)(c)
    }
}

impl fmt::Debug for HandlerFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandlerFunc")
    }
}

/// Immutable, shareable handler sequence attached to a route.
pub type HandlersChain = Arc<[HandlerFunc]>;

/// Anything that can be registered as a handler: closures, `fn` items and
/// already built [`HandlerFunc`]s.
pub trait IntoHandler {
    fn into_handler(self) -> HandlerFunc;
}

impl<F> IntoHandler for F
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    fn into_handler(self) -> HandlerFunc {
        HandlerFunc::new(self)
    }
}

impl IntoHandler for HandlerFunc {
    fn into_handler(self) -> HandlerFunc {
        self
    }
}

/// Build a `Vec<HandlerFunc>` from a list of handlers of mixed types.
///
/// ```
/// use whisk::{handlers, Context};
///
/// fn auth(c: &mut Context) {
///     c.next();
/// }
///
/// let chain = handlers![auth, |c: &mut Context| c.string(200, "ok")];
/// assert_eq!(chain.len(), 2);
/// ```
#[macro_export]
macro_rules! handlers {
    ($($handler:expr),* $(,)?) => {
        vec![$($crate::IntoHandler::into_handler($handler)),*]
    };
}
