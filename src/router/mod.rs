//! # Router Module
//!
//! Route registration and resolution.
//!
//! ## Overview
//!
//! Handlers are registered on a [`Router`] under a method and a pattern such as
//! `/users/{id}`. Patterns without placeholders become *exact* routes looked up
//! by `METHOD:path`; patterns with placeholders become *dynamic* routes whose
//! `{name}` tokens are compiled to `([\w.-]+)` capture groups.
//!
//! Routers can be mounted under a prefix with a [`Group`]. At startup every
//! router and group is merged into one read-only [`RouteTable`].
//!
//! ## Matching
//!
//! 1. **Exact**: O(1) hash lookup on `METHOD:normalized_path`. Always wins.
//! 2. **Dynamic**: the method's regex entries in registration order; the first
//!    match binds its captures to the placeholder names.
//! 3. Otherwise no match, and the dispatcher answers with its 404 handler.
//!
//! ## Example
//!
//! ```rust
//! use brrtweb::router::{Group, RouteTable, Router};
//! use http::Method;
//!
//! let mut users = Router::new();
//! users.get("/users/{id}", |ctx| {
//!     let id = ctx.param("id");
//!     ctx.text(&id);
//!     Ok(())
//! });
//!
//! let table = RouteTable::build(&[], &[Group::new("/api", vec![users])]);
//! let m = table.resolve(&Method::GET, "/api/users/42").unwrap();
//! assert_eq!(m.param("id"), Some("42"));
//! ```

mod group;
mod route;
mod table;
#[cfg(test)]
mod tests;

pub use group::Group;
pub use route::{DynamicRoute, ExactRoute, RouteError, Router, PARAM_CAPTURE, SUPPORTED_METHODS};
pub use table::{ParamVec, RouteMatch, RouteTable, MAX_INLINE_PARAMS};
