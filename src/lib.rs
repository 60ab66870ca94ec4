//! # brrtweb
//!
//! **brrtweb** is a coroutine-powered HTTP web framework for Rust built on the
//! [`may`](https://docs.rs/may) runtime.
//!
//! ## Overview
//!
//! An application registers handlers under a method and a path pattern,
//! optionally grouped under a shared prefix, and wraps them in an ordered
//! middleware chain. At startup every route is merged into one read-only
//! table; per request the dispatcher borrows a pooled [`Context`], resolves the
//! route, runs `middlewares ++ [handler]` and hands the response back to the
//! server.
//!
//! ## Architecture
//!
//! - **[`path`]** - path normalization and prefix joining
//! - **[`router`]** - route registration, groups and the two-tier route table
//! - **[`context`]** - per-request state: parameters, data, response and the
//!   handler chain cursor, plus the pool that recycles contexts
//! - **[`dispatcher`]** - the per-request entry point
//! - **[`middleware`]** - header, logger, recovery, CORS and session middlewares
//! - **[`session`]** - session and provider contracts, in-memory provider
//! - **[`rest`]** - REST controllers mapped onto a resource prefix
//! - **[`server`]** - HTTP/1.1 server over `may` coroutines
//! - **[`app`]** - the builder tying it all together
//!
//! ## Request Flow
//!
//! ```text
//! TCP connection (one coroutine)
//!   -> server::Request
//!   -> Dispatcher::serve
//!        pool.acquire()          reset context
//!        table.resolve()         exact, then dynamic
//!        ctx.next()              session -> header -> logger -> recovery
//!                                -> user middlewares -> route handler
//!   -> server::response::encode
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use brrtweb::{App, Group, Router};
//!
//! fn main() -> std::io::Result<()> {
//!     let mut api = Router::new();
//!     api.get("/users/{id}", |ctx| {
//!         let id = ctx.param("id");
//!         ctx.json(&serde_json::json!({ "id": id }))
//!     });
//!
//!     let mut app = App::new();
//!     app.use_logger()
//!         .use_recovery()
//!         .add_group(Group::new("/api", vec![api]))
//!         .get("/", |ctx| {
//!             ctx.text("hello");
//!             Ok(())
//!         });
//!     app.run()
//! }
//! ```
//!
//! ## Configuration
//!
//! [`config::AppConfig`] is read from YAML or TOML (`BRRTWEB_CONFIG_FILE`)
//! with `BRRTWEB_*` environment overrides. Logging is set up with
//! [`logging::init_logging`]; coroutine stack size and worker count come from
//! [`runtime_config::RuntimeConfig`].

pub mod app;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod mime;
pub mod path;
pub mod rest;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod session;

pub use app::App;
pub use context::{Context, Handler, Response};
pub use dispatcher::Dispatcher;
pub use error::{Error, HandlerResult};
pub use middleware::Middleware;
pub use rest::RestController;
pub use router::{Group, RouteTable, Router};
