//! Request dispatch.
//!
//! [`Dispatcher::serve`] is the per-request entry point: it binds the request
//! to a pooled [`Context`](crate::context::Context), resolves the route,
//! builds the chain `middlewares ++ [route handler]` and drives it with
//! [`Context::next`](crate::context::Context::next).
//!
//! ```rust
//! use brrtweb::dispatcher::Dispatcher;
//! use brrtweb::router::{Group, RouteTable, Router};
//! use brrtweb::server::Request;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.get("/ping", |ctx| {
//!     ctx.text("pong");
//!     Ok(())
//! });
//! let dispatcher = Dispatcher::new(RouteTable::build(&[router], &[] as &[Group]));
//! let response = dispatcher.serve(Request::new(Method::GET, "/ping")).unwrap();
//! assert_eq!(response.body_str(), "pong");
//! ```

mod core;

pub use core::{Dispatcher, NOT_FOUND_BODY};
