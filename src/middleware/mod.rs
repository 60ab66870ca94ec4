//! Built-in middlewares and the [`Middleware`] trait.

mod core;
mod cors;
mod header;
mod logger;
mod recovery;
mod session;

pub use core::{from_fn, FnMiddleware, Middleware};
pub use cors::CorsMiddleware;
pub use header::HeaderMiddleware;
pub use logger::LoggerMiddleware;
pub use recovery::{RecoveryHandler, RecoveryMiddleware};
pub use session::SessionMiddleware;
