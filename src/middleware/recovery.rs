use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use super::Middleware;
use crate::context::{Context, Handler, Response};
use crate::error::HandlerResult;
use crate::mime;

/// Custom recovery: receives the context and the failure message.
pub type RecoveryHandler = Arc<dyn Fn(&mut Context, &str) -> HandlerResult + Send + Sync>;

/// Catch boundary around the rest of the chain.
///
/// A handler error or a panic further down is turned into a `500` JSON reply
/// `{"<code_name>": <code>, "<msg_name>": "<message>"}`, or handed to a
/// custom handler.
#[derive(Clone)]
pub struct RecoveryMiddleware {
    code_name: String,
    code: i64,
    msg_name: String,
    custom: Option<RecoveryHandler>,
}

impl Default for RecoveryMiddleware {
    fn default() -> Self {
        Self::with_config("code", 500, "message")
    }
}

impl RecoveryMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(code_name: &str, code: i64, msg_name: &str) -> Self {
        Self {
            code_name: code_name.to_string(),
            code,
            msg_name: msg_name.to_string(),
            custom: None,
        }
    }

    /// Replace the JSON reply with `handler`.
    #[must_use]
    pub fn handler_fn<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Context, &str) -> HandlerResult + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(handler));
        self
    }

    fn reply(&self, message: &str) -> String {
        let quote = |s: &str| serde_json::Value::from(s).to_string();
        format!(
            "{{{}:{},{}:{}}}",
            quote(&self.code_name),
            self.code,
            quote(&self.msg_name),
            quote(message)
        )
    }

    fn recover(&self, ctx: &mut Context, message: &str) -> HandlerResult {
        error!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.request().path,
            error = message,
            "Recovered from request failure"
        );
        if let Some(custom) = &self.custom {
            return custom(ctx, message);
        }
        ctx.write(
            Response::builder()
                .body(self.reply(message))
                .content_type(mime::JSON)
                .status(500)
                .build(),
        );
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

impl Middleware for RecoveryMiddleware {
    fn handler(&self) -> Handler {
        let this = self.clone();
        Arc::new(move |ctx: &mut Context| {
            match catch_unwind(AssertUnwindSafe(|| ctx.next())) {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => this.recover(ctx, &e.to_string()),
                Err(payload) => this.recover(ctx, &panic_message(payload.as_ref())),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_escapes_and_orders_fields() {
        let r = RecoveryMiddleware::with_config("status", 42, "error");
        assert_eq!(r.reply("bad \"x\""), r#"{"status":42,"error":"bad \"x\""}"#);
    }

    #[test]
    fn test_panic_message() {
        let p: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(p.as_ref()), "boom");
        let p: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(p.as_ref()), "bang");
        let p: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(p.as_ref()), "panic");
    }
}
