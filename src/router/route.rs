use std::fmt;
use std::sync::Arc;

use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::context::{Context, Handler};
use crate::error::HandlerResult;
use crate::path::trim_special_chars;
use crate::rest::{RestController, REST_KEY};

/// Methods a route may be registered for. `*` expands to all of them.
pub const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
];

/// Capture group substituted for every `{name}` placeholder.
pub const PARAM_CAPTURE: &str = r"([\w.-]+)";

#[allow(clippy::expect_used)]
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder regex is valid"));

/// Registration-time failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The method is not one of [`SUPPORTED_METHODS`] and not `*`.
    UnsupportedMethod(String),
    /// A hand-written dynamic pattern did not compile.
    InvalidPattern { pattern: String, reason: String },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::UnsupportedMethod(m) => write!(f, "method not supported : {m}"),
            RouteError::InvalidPattern { pattern, reason } => {
                write!(f, "invalid route pattern {pattern}: {reason}")
            }
        }
    }
}

impl std::error::Error for RouteError {}

/// Route without placeholders, matched by `METHOD:path` lookup.
#[derive(Clone)]
pub struct ExactRoute {
    pub method: Method,
    pub path: String,
    pub handler: Handler,
}

/// Route with placeholders, matched by regex.
///
/// `pattern` is the unanchored regex body; the route table wraps it as
/// `^<prefix><pattern>$` when the routers are merged.
#[derive(Clone)]
pub struct DynamicRoute {
    pub method: Method,
    pub pattern: String,
    pub params: Vec<Arc<str>>,
    pub handler: Handler,
}

impl fmt::Debug for ExactRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExactRoute")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for DynamicRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicRoute")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Collects route registrations before they are merged into a
/// [`RouteTable`](super::RouteTable).
///
/// # Example
///
/// ```rust
/// use brrtweb::router::Router;
///
/// let mut router = Router::new();
/// router
///     .get("/hello", |ctx| {
///         ctx.text("hello");
///         Ok(())
///     })
///     .get("/users/{id}", |ctx| {
///         let id = ctx.param("id");
///         ctx.text(&id);
///         Ok(())
///     });
/// assert_eq!(router.exact_routes().len(), 1);
/// assert_eq!(router.dynamic_routes().len(), 1);
/// ```
#[derive(Clone, Default, Debug)]
pub struct Router {
    exact: Vec<ExactRoute>,
    dynamic: Vec<DynamicRoute>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` and `pattern`.
    ///
    /// # Panics
    ///
    /// Panics when `method` is neither a supported method nor `*`. Use
    /// [`Router::try_route`] to get the failure as a value instead.
    pub fn route<F>(&mut self, method: &str, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.route_handler(method, pattern, Arc::new(handler))
    }

    /// Same as [`Router::route`] for an already shared handler.
    ///
    /// # Panics
    ///
    /// Panics when `method` is not supported.
    // Registration happens at startup, never on the request path
    #[allow(clippy::panic)]
    pub fn route_handler(&mut self, method: &str, pattern: &str, handler: Handler) -> &mut Self {
        if let Err(e) = self.try_route(method, pattern, handler) {
            panic!("{e}");
        }
        self
    }

    /// Register a route, reporting unsupported methods as an error.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnsupportedMethod`] for anything other than the
    /// seven supported methods or `*`.
    pub fn try_route(
        &mut self,
        method: &str,
        pattern: &str,
        handler: Handler,
    ) -> Result<&mut Self, RouteError> {
        let methods = expand_method(method)?;
        let pattern = trim_special_chars(pattern);

        if PLACEHOLDER_RE.is_match(&pattern) {
            let (body, params) = compile_placeholders(&pattern);
            for m in methods {
                debug!(method = %m, pattern = %pattern, regex = %body, "Dynamic route registered");
                self.dynamic.push(DynamicRoute {
                    method: m,
                    pattern: body.clone(),
                    params: params.clone(),
                    handler: Arc::clone(&handler),
                });
            }
        } else {
            for m in methods {
                debug!(method = %m, path = %pattern, "Exact route registered");
                self.exact.push(ExactRoute {
                    method: m,
                    path: pattern.clone(),
                    handler: Arc::clone(&handler),
                });
            }
        }
        Ok(self)
    }

    /// Register a hand-written dynamic route.
    ///
    /// `regex` is the unanchored pattern body and `params` names its capture
    /// groups in order. An entry whose capture-group count differs from
    /// `params.len()` is kept but never matches.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported methods and patterns that do not
    /// compile.
    pub fn route_regex<F>(
        &mut self,
        method: &str,
        regex: &str,
        params: &[&str],
        handler: F,
    ) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        let methods = expand_method(method)?;
        Regex::new(&format!("^{regex}$")).map_err(|e| RouteError::InvalidPattern {
            pattern: regex.to_string(),
            reason: e.to_string(),
        })?;
        let handler: Handler = Arc::new(handler);
        let params: Vec<Arc<str>> = params.iter().map(|p| Arc::from(*p)).collect();
        for m in methods {
            self.dynamic.push(DynamicRoute {
                method: m,
                pattern: regex.to_string(),
                params: params.clone(),
                handler: Arc::clone(&handler),
            });
        }
        Ok(self)
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.route("GET", pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.route("POST", pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.route("PUT", pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.route("DELETE", pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.route("PATCH", pattern, handler)
    }

    pub fn head<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.route("HEAD", pattern, handler)
    }

    pub fn options<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.route("OPTIONS", pattern, handler)
    }

    /// Register `handler` for every supported method.
    pub fn any<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.route("*", pattern, handler)
    }

    /// Serve a file from disk on `GET pattern`.
    pub fn resource(&mut self, pattern: &str, file: &str, content_type: &str) -> &mut Self {
        let file = file.to_string();
        let content_type = content_type.to_string();
        self.get(pattern, move |ctx| ctx.file(&file, &content_type))
    }

    /// Serve an embedded asset on `GET pattern`.
    pub fn asset(
        &mut self,
        source: Arc<dyn crate::context::AssetSource>,
        pattern: &str,
        name: &str,
        content_type: &str,
    ) -> &mut Self {
        let name = name.to_string();
        let content_type = content_type.to_string();
        self.get(pattern, move |ctx| ctx.asset(source.as_ref(), &name, &content_type))
    }

    /// Wire a REST controller's handlers under its prefix.
    ///
    /// `list` and `create` bind to `{prefix}`; `get`, `update` and `delete`
    /// bind to `{prefix}/{RESTFUL_KEY}`. Absent handlers are skipped.
    pub fn controller(&mut self, controller: &dyn RestController) -> &mut Self {
        let prefix = trim_special_chars(controller.prefix());
        let keyed = format!("{}/{{{REST_KEY}}}", prefix.trim_end_matches('/'));
        if let Some(h) = controller.get() {
            self.route_handler("GET", &keyed, h);
        }
        if let Some(h) = controller.list() {
            self.route_handler("GET", &prefix, h);
        }
        if let Some(h) = controller.create() {
            self.route_handler("POST", &prefix, h);
        }
        if let Some(h) = controller.update() {
            self.route_handler("PUT", &keyed, h);
        }
        if let Some(h) = controller.delete() {
            self.route_handler("DELETE", &keyed, h);
        }
        self
    }

    #[must_use]
    pub fn exact_routes(&self) -> &[ExactRoute] {
        &self.exact
    }

    #[must_use]
    pub fn dynamic_routes(&self) -> &[DynamicRoute] {
        &self.dynamic
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.dynamic.is_empty()
    }
}

fn expand_method(method: &str) -> Result<Vec<Method>, RouteError> {
    if method == "*" {
        return Ok(SUPPORTED_METHODS.to_vec());
    }
    SUPPORTED_METHODS
        .iter()
        .find(|m| m.as_str() == method)
        .map(|m| vec![m.clone()])
        .ok_or_else(|| RouteError::UnsupportedMethod(method.to_string()))
}

/// Replace every `{name}` with [`PARAM_CAPTURE`], escaping the literal text
/// between placeholders, and collect the names left to right.
pub(crate) fn compile_placeholders(pattern: &str) -> (String, Vec<Arc<str>>) {
    let mut body = String::with_capacity(pattern.len() + 16);
    let mut params = Vec::new();
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(pattern) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        body.push_str(&regex::escape(&pattern[last..whole.start()]));
        body.push_str(PARAM_CAPTURE);
        params.push(Arc::from(name.as_str()));
        last = whole.end();
    }
    body.push_str(&regex::escape(&pattern[last..]));
    (body, params)
}
