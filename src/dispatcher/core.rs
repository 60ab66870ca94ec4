#![deny(
    clippy::inefficient_to_string,
    clippy::format_push_string,
    clippy::unnecessary_to_owned
)]

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use crate::context::{Context, ContextPool, Handler, ListenerRegistry, Response, Templates};
use crate::error::Error;
use crate::middleware::Middleware;
use crate::mime;
use crate::router::RouteTable;
use crate::server::Request;

/// Body of the default not-found reply.
pub const NOT_FOUND_BODY: &str = "404 page not found";

/// Per-request entry point.
///
/// For each request the dispatcher takes a context from its pool, resolves
/// the route (or the not-found handler), runs the chain
/// `middlewares ++ [route handler]` and hands back the response. The route
/// table, middleware list and templates are read-only once serving starts,
/// so a dispatcher is shared across connections behind an `Arc`.
pub struct Dispatcher {
    table: Arc<RouteTable>,
    middlewares: Vec<Handler>,
    names: Vec<&'static str>,
    pool: ContextPool,
    templates: Arc<Templates>,
    not_found: Handler,
}

fn not_found_handler() -> Handler {
    Arc::new(|ctx: &mut Context| {
        ctx.write(
            Response::builder()
                .status(404)
                .body(NOT_FOUND_BODY)
                .content_type(mime::TEXT)
                .build(),
        );
        Ok(())
    })
}

impl Dispatcher {
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: Arc::new(table),
            middlewares: Vec::new(),
            names: Vec::new(),
            pool: ContextPool::default(),
            templates: Arc::new(Templates::default()),
            not_found: not_found_handler(),
        }
    }

    /// Use `pool` for contexts; its listener registry receives lifecycle
    /// events.
    #[must_use]
    pub fn with_pool(mut self, pool: ContextPool) -> Self {
        self.pool = pool;
        self
    }

    #[must_use]
    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    /// Append a middleware; middlewares run in the order added.
    pub fn add_middleware(&mut self, middleware: &dyn Middleware) -> &mut Self {
        self.middlewares.push(middleware.handler());
        self.names.push(middleware.name());
        self
    }

    /// Replace the handler answering unmatched requests.
    pub fn set_not_found(&mut self, handler: Handler) -> &mut Self {
        self.not_found = handler;
        self
    }

    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    #[must_use]
    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    #[must_use]
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        self.pool.listeners()
    }

    #[must_use]
    pub fn middleware_names(&self) -> &[&'static str] {
        &self.names
    }

    /// Run `request` through the chain and return the final response.
    ///
    /// # Errors
    ///
    /// The error a handler returned when no recovery middleware caught it.
    pub fn serve(&self, request: Request) -> Result<Response, Error> {
        let start = Instant::now();
        let mut ctx = self.pool.acquire();
        ctx.allocate(request, Arc::clone(&self.templates));

        let terminal = match self.table.resolve(ctx.method(), &ctx.request().path) {
            Some(matched) => {
                ctx.set_path_params(&matched.params);
                matched.handler
            }
            None => Arc::clone(&self.not_found),
        };
        ctx.add_handlers(self.middlewares.iter().map(|h| Some(Arc::clone(h))));
        ctx.add_handler(terminal);

        let result = ctx.next();
        let response = ctx.take_response();
        match result {
            Ok(()) => {
                debug!(
                    request_id = %ctx.request_id(),
                    status = response.status,
                    latency_us = start.elapsed().as_micros() as u64,
                    "Request served"
                );
                Ok(response)
            }
            Err(e) => {
                error!(
                    request_id = %ctx.request_id(),
                    method = %ctx.method(),
                    path = %ctx.request().path,
                    error = %e,
                    "Unhandled handler error"
                );
                Err(e)
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.table.len())
            .field("middlewares", &self.names)
            .field("templates", &self.templates)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{Group, Router};
    use http::Method;

    fn dispatcher() -> Dispatcher {
        let mut r = Router::new();
        r.get("/hello", |ctx| {
            ctx.text("hi");
            Ok(())
        });
        r.get("/user/{id}", |ctx| {
            let id = ctx.param("id");
            ctx.text(&id);
            Ok(())
        });
        Dispatcher::new(RouteTable::build(&[r], &[] as &[Group]))
    }

    #[test]
    fn test_serve_exact_and_dynamic() {
        let d = dispatcher();
        let res = d.serve(Request::new(Method::GET, "/hello")).unwrap();
        assert_eq!(res.body_str(), "hi");
        let res = d.serve(Request::new(Method::GET, "/user/42?id=q")).unwrap();
        assert_eq!(res.body_str(), "42");
    }

    #[test]
    fn test_not_found() {
        let d = dispatcher();
        let res = d.serve(Request::new(Method::POST, "/hello")).unwrap();
        assert_eq!(res.status, 404);
        assert_eq!(res.body_str(), NOT_FOUND_BODY);
        assert_eq!(res.content_type, mime::TEXT);
    }

    #[test]
    fn test_custom_not_found() {
        let mut d = dispatcher();
        d.set_not_found(Arc::new(|ctx: &mut Context| {
            ctx.status(404).json_text("{}");
            Ok(())
        }));
        let res = d.serve(Request::new(Method::GET, "/nope")).unwrap();
        assert_eq!(res.body_str(), "{}");
        assert_eq!(res.content_type, mime::JSON);
    }

    #[test]
    fn test_error_escapes_without_recovery_and_context_returns() {
        let mut r = Router::new();
        r.get("/fail", |_ctx| Err(Error::custom("nope")));
        let d = Dispatcher::new(RouteTable::build(&[r], &[] as &[Group]));
        let err = d.serve(Request::new(Method::GET, "/fail")).unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert_eq!(d.pool().idle(), 1);
    }
}
