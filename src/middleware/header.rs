use std::sync::Arc;

use http::header::{HeaderName, HeaderValue, SERVER};

use super::Middleware;
use crate::context::{Context, Handler};

/// Sets fixed response headers, `Server: brrtweb` by default, before the
/// rest of the chain runs.
#[derive(Debug, Clone)]
pub struct HeaderMiddleware {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl Default for HeaderMiddleware {
    fn default() -> Self {
        Self {
            headers: vec![(SERVER, HeaderValue::from_static("brrtweb"))],
        }
    }
}

impl HeaderMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with(mut self, name: &str, value: &str) -> Self {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.retain(|(k, _)| *k != n);
            self.headers.push((n, v));
        }
        self
    }
}

impl Middleware for HeaderMiddleware {
    fn handler(&self) -> Handler {
        let headers = self.headers.clone();
        Arc::new(move |ctx: &mut Context| {
            for (name, value) in &headers {
                ctx.response_mut().headers.insert(name.clone(), value.clone());
            }
            ctx.next()
        })
    }
}
