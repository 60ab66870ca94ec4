//! Per-request state shared by middlewares and route handlers.
//!
//! A [`Context`] carries the request, the response being built, merged
//! parameters, request-scoped data and the handler chain. Contexts live in a
//! [`ContextPool`] and are cleared before reuse.

mod bind;
mod core;
mod listener;
mod multipart;
mod pool;
mod response;
mod template;
mod writer;

pub use bind::ValidationReply;
pub use core::{Context, Handler};
pub use listener::{Listener, ListenerFn, ListenerRegistry};
pub use multipart::MultipartFile;
pub use pool::{ContextPool, PooledContext, DEFAULT_MAX_IDLE};
pub use response::{Cookie, Response, ResponseBuilder, ResponsePatch, SameSite};
pub use template::{render, Templates};
pub use writer::{AssetSource, DirAssets, EmbeddedAssets};
