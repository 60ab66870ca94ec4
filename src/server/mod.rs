//! HTTP/1.1 transport.
//!
//! [`HttpServer`] accepts connections on a `may` listener and hands each
//! parsed [`Request`] to a [`Service`], normally a
//! [`Dispatcher`](crate::dispatcher::Dispatcher).

mod http_server;
pub mod request;
pub mod response;

pub use http_server::{HttpServer, ServerHandle, Service};
pub use request::Request;
