use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

use crate::context::Context;
use crate::handler::HandlerFunc;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Run the rest of the chain inside `catch_unwind`.
///
/// A panic is logged with its message and a backtrace, the chain is marked
/// [`Halt::Panicked`](crate::Halt::Panicked) and the response becomes a 500
/// unless a status was already committed.
///
/// The backtrace is taken once the stack has unwound, so its frames show the
/// recovery site rather than the panic site. It is captured whether or not
/// `RUST_BACKTRACE` is set.
pub fn recovery() -> HandlerFunc {
    HandlerFunc::new(|c: &mut Context| {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            c.next();
        }));
        if let Err(payload) = result {
            let backtrace = Backtrace::force_capture();
            error!(
                method = %c.method(),
                path = %c.path(),
                panic = %panic_message(payload.as_ref()),
                backtrace = %backtrace,
                "Recovered from panic"
            );
            c.recover();
        }
    })
}
