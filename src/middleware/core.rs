use std::sync::Arc;

use crate::context::{Context, Handler};
use crate::error::HandlerResult;

/// A component contributing one handler to the front of every request chain.
///
/// The handler runs before the route handler; it continues the chain with
/// [`Context::next`] and may inspect or rewrite the response after it
/// returns.
pub trait Middleware: Send + Sync {
    fn handler(&self) -> Handler;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Middleware built from a closure.
pub struct FnMiddleware {
    handler: Handler,
}

impl Middleware for FnMiddleware {
    fn handler(&self) -> Handler {
        Arc::clone(&self.handler)
    }
}

/// Wrap a closure as a [`Middleware`].
///
/// ```rust
/// use brrtweb::middleware::{from_fn, Middleware};
///
/// let timing = from_fn(|ctx| {
///     ctx.set_header("X-Powered-By", "coroutines");
///     ctx.next()
/// });
/// let _handler = timing.handler();
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware
where
    F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
{
    FnMiddleware {
        handler: Arc::new(f),
    }
}
