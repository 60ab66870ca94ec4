use std::sync::Arc;

use http::header::{
    HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW,
};
use http::{HeaderMap, Method};

use super::Middleware;
use crate::context::{Context, Handler};

/// Cross-origin headers for every response.
///
/// `HEAD` and `OPTIONS` requests are answered directly with `200` and an
/// empty body; the route handler does not run for them.
///
/// ```rust
/// use brrtweb::middleware::CorsMiddleware;
///
/// let cors = CorsMiddleware::new()
///     .origin("https://example.com")
///     .allow_headers(&["Content-Type", "Authorization"])
///     .header("Access-Control-Max-Age", "600");
/// ```
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    origin: String,
    methods: Vec<String>,
    allow_headers: Vec<String>,
    extra: HeaderMap,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            origin: "*".to_string(),
            methods: vec!["GET, POST, DELETE, PUT, PATCH, HEAD, OPTIONS".to_string()],
            allow_headers: Vec::new(),
            extra: HeaderMap::new(),
        }
    }
}

impl CorsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn origin(mut self, origin: &str) -> Self {
        self.origin = origin.to_string();
        self
    }

    /// Values of `Allow` and `Access-Control-Allow-Methods`.
    #[must_use]
    pub fn methods(mut self, methods: &[&str]) -> Self {
        self.methods = methods.iter().map(|m| (*m).to_string()).collect();
        self
    }

    #[must_use]
    pub fn allow_headers(mut self, headers: &[&str]) -> Self {
        self.allow_headers = headers.iter().map(|h| (*h).to_string()).collect();
        self
    }

    /// Extra header appended to every response. Invalid names or values are
    /// ignored.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.extra.append(n, v);
        }
        self
    }

    fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(origin) = HeaderValue::from_str(&self.origin) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        let methods: Vec<HeaderValue> = self
            .methods
            .iter()
            .filter_map(|m| HeaderValue::from_str(m).ok())
            .collect();
        replace_all(headers, ALLOW, &methods);
        replace_all(headers, ACCESS_CONTROL_ALLOW_METHODS, &methods);
        let allowed: Vec<HeaderValue> = self
            .allow_headers
            .iter()
            .filter_map(|h| HeaderValue::from_str(h).ok())
            .collect();
        replace_all(headers, ACCESS_CONTROL_ALLOW_HEADERS, &allowed);
        for (name, value) in &self.extra {
            headers.append(name.clone(), value.clone());
        }
    }
}

fn replace_all(headers: &mut HeaderMap, name: HeaderName, values: &[HeaderValue]) {
    headers.remove(&name);
    for v in values {
        headers.append(name.clone(), v.clone());
    }
}

impl Middleware for CorsMiddleware {
    fn handler(&self) -> Handler {
        let this = self.clone();
        Arc::new(move |ctx: &mut Context| {
            this.apply(&mut ctx.response_mut().headers);
            if matches!(*ctx.method(), Method::HEAD | Method::OPTIONS) {
                ctx.set_body(Vec::new()).status(200);
                return Ok(());
            }
            ctx.next()
        })
    }
}
