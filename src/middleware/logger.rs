use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use super::Middleware;
use crate::context::{Context, Handler};

/// Logs one `info` event per request once the rest of the chain has run.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handler(&self) -> Handler {
        Arc::new(|ctx: &mut Context| {
            let start = Instant::now();
            let result = ctx.next();
            let req = ctx.request();
            let res = ctx.response();
            info!(
                request_id = %ctx.request_id(),
                remote = %req.remote_addr.map(|a| a.to_string()).unwrap_or_default(),
                method = %req.method,
                uri = %req.request_uri(),
                proto = req.proto(),
                status = res.status,
                bytes = res.body_len(),
                ms = start.elapsed().as_millis() as u64,
                user_agent = req.user_agent(),
                "Request completed"
            );
            result
        })
    }
}
