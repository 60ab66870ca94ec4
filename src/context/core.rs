//! Request context - per-request state and the chain cursor.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use http::{Extensions, HeaderMap, Method};
use serde_json::{Map, Value};

use super::listener::ListenerRegistry;
use super::multipart::MultipartFile;
use super::response::{Cookie, Response, ResponsePatch};
use super::template::Templates;
use crate::error::{Error, HandlerResult};
use crate::ids::RequestId;
use crate::mime;
use crate::rest::REST_KEY;
use crate::router::ParamVec;
use crate::server::request::{parse_query_params, Request};

/// A step in a request chain: middleware or terminal route handler.
///
/// A handler continues the chain by calling [`Context::next`] and halts it by
/// returning without doing so.
pub type Handler = Arc<dyn Fn(&mut Context) -> HandlerResult + Send + Sync>;

/// Per-request state.
///
/// Contexts are owned by a [`ContextPool`](super::ContextPool) and reused:
/// [`Context::reset`] clears every per-request field when a context goes back
/// to the pool, and [`Context::allocate`] binds the next request.
pub struct Context {
    request: Request,
    response: Response,
    request_id: RequestId,
    params: HashMap<String, Vec<String>>,
    form: HashMap<String, Vec<String>>,
    handlers: Vec<Handler>,
    pos: usize,
    data: Map<String, Value>,
    extensions: Extensions,
    pub(crate) files: HashMap<String, Vec<MultipartFile>>,
    pub(crate) funcs: HashMap<String, minijinja::Value>,
    pub(crate) templates: Arc<Templates>,
    listeners: Arc<ListenerRegistry>,
}

impl Context {
    /// Create a context and fire the `created` listeners.
    #[must_use]
    pub fn new(listeners: Arc<ListenerRegistry>) -> Self {
        let ctx = Self {
            request: Request::default(),
            response: Response::default(),
            request_id: RequestId::new(),
            params: HashMap::new(),
            form: HashMap::new(),
            handlers: Vec::new(),
            pos: 0,
            data: Map::new(),
            extensions: Extensions::new(),
            files: HashMap::new(),
            funcs: HashMap::new(),
            templates: Arc::new(Templates::default()),
            listeners,
        };
        ctx.listeners.fire_created(&ctx);
        ctx
    }

    /// Bind a request to this context.
    ///
    /// Query parameters, and the body of an urlencoded form request, are
    /// parsed into both the parameter map and the query map; form body
    /// values come first. Template helper functions are copied from
    /// `templates`.
    pub fn allocate(&mut self, request: Request, templates: Arc<Templates>) {
        let mut pairs = Vec::new();
        if has_form_body(&request) {
            pairs.extend(parse_query_params(&String::from_utf8_lossy(&request.body)));
        }
        pairs.extend(request.query_pairs());
        for (k, v) in pairs {
            self.form.entry(k).or_default().push(v);
        }
        for (k, v) in &self.form {
            self.params.insert(k.clone(), v.clone());
        }

        self.request_id = RequestId::from_header_or_new(request.header("x-request-id"));
        self.funcs = templates.funcs().clone();
        self.templates = templates;
        self.request = request;
    }

    /// Clear all per-request state.
    pub fn reset(&mut self) {
        self.request = Request::default();
        self.response = Response::default();
        self.params.clear();
        self.form.clear();
        self.handlers.clear();
        self.pos = 0;
        self.data.clear();
        self.extensions.clear();
        self.files.clear();
        self.funcs.clear();
    }

    /// Append a handler to the chain.
    pub fn add_handler(&mut self, handler: Handler) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    /// Append handlers to the chain, skipping `None` entries.
    pub fn add_handlers<I>(&mut self, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Option<Handler>>,
    {
        self.handlers.extend(handlers.into_iter().flatten());
        self
    }

    /// Run the next handler in the chain.
    ///
    /// No-op on an empty chain. Once every handler has run, the call fires
    /// the `destroyed` listeners instead. Errors from the invoked handler are
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Whatever the next handler returns.
    pub fn next(&mut self) -> HandlerResult {
        if self.handlers.is_empty() {
            return Ok(());
        }
        if self.pos >= self.handlers.len() {
            let listeners = Arc::clone(&self.listeners);
            listeners.fire_destroyed(self);
            return Ok(());
        }
        self.pos += 1;
        let handler = Arc::clone(&self.handlers[self.pos - 1]);
        handler(self)
    }

    /// Number of handlers already invoked.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.request.method
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Move the response out, leaving a default one behind.
    pub fn take_response(&mut self) -> Response {
        std::mem::take(&mut self.response)
    }

    pub(crate) fn set_path_params(&mut self, params: &ParamVec) {
        for (name, value) in params {
            self.params.insert(name.to_string(), vec![value.clone()]);
        }
    }

    // --- parameters -------------------------------------------------------

    #[must_use]
    pub fn param_map(&self) -> &HashMap<String, Vec<String>> {
        &self.params
    }

    /// First value of a parameter, or `""`.
    #[must_use]
    pub fn param(&self, name: &str) -> String {
        self.param_or(name, "")
    }

    /// First value of a parameter; `default` when absent or empty.
    #[must_use]
    pub fn param_or(&self, name: &str, default: &str) -> String {
        match self.params.get(name).and_then(|v| v.first()) {
            Some(v) if !v.is_empty() => v.clone(),
            _ => default.to_string(),
        }
    }

    /// All values of a parameter, or an empty slice.
    #[must_use]
    pub fn params(&self, name: &str) -> &[String] {
        self.params.get(name).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn params_or(&self, name: &str, default: Vec<String>) -> Vec<String> {
        self.params.get(name).cloned().unwrap_or(default)
    }

    #[must_use]
    pub fn has_param(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Parameter parsed as an integer; `default` when absent or unparsable.
    #[must_use]
    pub fn int_param(&self, name: &str, default: i64) -> i64 {
        if !self.has_param(name) {
            return default;
        }
        self.param(name).parse().unwrap_or(default)
    }

    /// Parameter parsed as a float; `default` when absent or unparsable.
    #[must_use]
    pub fn float_param(&self, name: &str, default: f64) -> f64 {
        if !self.has_param(name) {
            return default;
        }
        self.param(name).parse().unwrap_or(default)
    }

    /// Merge `map` into the parameters, clearing them first when `flush`.
    pub fn set_param_map(&mut self, map: HashMap<String, Vec<String>>, flush: bool) -> &mut Self {
        if flush {
            self.params.clear();
        }
        self.params.extend(map);
        self
    }

    /// Parameters reduced to their first value.
    #[must_use]
    pub fn single_param_map(&self) -> HashMap<String, String> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.first().cloned().unwrap_or_default()))
            .collect()
    }

    /// Parameters with their values joined by `separator`.
    #[must_use]
    pub fn joined_param_map(&self, separator: &str) -> HashMap<String, String> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.join(separator)))
            .collect()
    }

    /// REST key bound by a controller route (`{RESTFUL_KEY}`).
    #[must_use]
    pub fn key(&self) -> String {
        self.param(REST_KEY)
    }

    /// REST key parsed as an integer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParam`] when the key is missing or not an integer.
    pub fn int_key(&self) -> Result<i64, Error> {
        let key = self.key();
        key.parse().map_err(|_| Error::InvalidParam {
            name: REST_KEY.to_string(),
            value: key,
        })
    }

    // --- query / form -----------------------------------------------------

    #[must_use]
    pub fn query(&self, name: &str) -> String {
        self.query_or(name, "")
    }

    #[must_use]
    pub fn query_or(&self, name: &str, default: &str) -> String {
        self.form
            .get(name)
            .and_then(|v| v.first())
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    #[must_use]
    pub fn queries(&self, name: &str) -> &[String] {
        self.form.get(name).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn has_query(&self, name: &str) -> bool {
        self.form.contains_key(name)
    }

    /// Query value parsed as an integer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParam`] when the value is missing or not an integer.
    pub fn int_query(&self, name: &str) -> Result<i64, Error> {
        let value = self
            .form
            .get(name)
            .and_then(|v| v.first())
            .ok_or_else(|| Error::InvalidParam {
                name: name.to_string(),
                value: String::new(),
            })?;
        value.parse().map_err(|_| Error::InvalidParam {
            name: name.to_string(),
            value: value.clone(),
        })
    }

    #[must_use]
    pub fn int_query_or(&self, name: &str, default: i64) -> i64 {
        self.int_query(name).unwrap_or(default)
    }

    // --- request-scoped data ----------------------------------------------

    pub fn set_data(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.data.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn data(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn set_data_map(&mut self, map: Map<String, Value>, flush: bool) -> &mut Self {
        if flush {
            self.data.clear();
        }
        self.data.extend(map);
        self
    }

    #[must_use]
    pub fn data_map(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Typed request-scoped values (sessions, auth principals, ...).
    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    // --- response ---------------------------------------------------------

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.response.body = Some(body.into());
        self
    }

    pub fn status(&mut self, status: u16) -> &mut Self {
        self.response.status = status;
        self
    }

    /// Append every value of `headers` to the response headers.
    pub fn header(&mut self, headers: HeaderMap) -> &mut Self {
        let mut current: Option<HeaderName> = None;
        for (name, value) in headers {
            if name.is_some() {
                current = name;
            }
            if let Some(name) = &current {
                self.response.headers.append(name.clone(), value);
            }
        }
        self
    }

    /// Replace a single response header. Invalid names or values are ignored.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.response.headers.insert(n, v);
        }
        self
    }

    /// Append a single response header. Invalid names or values are ignored.
    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.response.headers.append(n, v);
        }
        self
    }

    pub fn add_cookie(&mut self, cookie: Cookie) -> &mut Self {
        self.response.cookies.push(cookie);
        self
    }

    /// Merge a partial response into the current one.
    pub fn write(&mut self, patch: ResponsePatch) {
        self.response.merge(patch);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .field("pos", &self.pos)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

fn has_form_body(request: &Request) -> bool {
    matches!(request.method, Method::POST | Method::PUT | Method::PATCH)
        && mime::essence(request.content_type()) == mime::FORM
}
