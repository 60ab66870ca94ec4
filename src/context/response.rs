use std::fmt;

use chrono::{DateTime, Utc};
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;

use crate::mime;

/// Response accumulated by a handler chain.
///
/// Starts as `200`, no headers, no cookies, no body and a plain-text content
/// type. Handlers change it through the context writers, which merge into it
/// rather than replacing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub cookies: Vec<Cookie>,
    pub body: Option<Vec<u8>>,
    pub content_type: String,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: None,
            content_type: mime::TEXT.to_string(),
        }
    }
}

impl Response {
    /// Start a partial response to be merged with
    /// [`Context::write`](crate::context::Context::write).
    #[must_use]
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    /// Standalone response used when a chain fails without recovery.
    #[must_use]
    pub fn internal_error() -> Self {
        Self {
            status: 500,
            body: Some(b"500 internal server error".to_vec()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, Vec::len)
    }

    /// Body as UTF-8 text (lossy), empty when there is no body.
    #[must_use]
    pub fn body_str(&self) -> String {
        self.body
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Apply a partial response.
    ///
    /// Body, content type and status overwrite only when set; each header
    /// name present in the patch replaces that name's values; cookies are
    /// appended.
    pub fn merge(&mut self, patch: ResponsePatch) {
        if let Some(body) = patch.body {
            self.body = Some(body);
        }
        if let Some(ct) = patch.content_type.filter(|ct| !ct.is_empty()) {
            self.content_type = ct;
        }
        let mut current: Option<HeaderName> = None;
        for (name, value) in patch.headers {
            if let Some(name) = name {
                self.headers.remove(&name);
                current = Some(name);
            }
            if let Some(name) = &current {
                self.headers.append(name.clone(), value);
            }
        }
        self.cookies.extend(patch.cookies);
        if let Some(status) = patch.status.filter(|s| *s > 0) {
            self.status = status;
        }
    }
}

/// A set of response fields to merge into the current response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsePatch {
    pub status: Option<u16>,
    pub headers: HeaderMap,
    pub cookies: Vec<Cookie>,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
}

/// Builder for a [`ResponsePatch`].
///
/// ```rust
/// use brrtweb::context::Response;
///
/// let patch = Response::builder()
///     .status(201)
///     .content_type("application/json")
///     .body(br#"{"ok":true}"#.to_vec())
///     .header("x-trace", "abc")
///     .build();
/// assert_eq!(patch.status, Some(201));
/// ```
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    patch: ResponsePatch,
}

impl ResponseBuilder {
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.patch.status = Some(status);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.patch.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: &str) -> Self {
        self.patch.content_type = Some(content_type.to_string());
        self
    }

    /// Append a header value. Invalid names or values are ignored.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.patch.headers.append(n, v);
        }
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.patch.headers = headers;
        self
    }

    #[must_use]
    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.patch.cookies.push(cookie);
        self
    }

    #[must_use]
    pub fn build(self) -> ResponsePatch {
        self.patch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

/// A `Set-Cookie` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            expires: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    #[must_use]
    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    #[must_use]
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(expires) = &self.expires {
            write!(f, "; Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT"))?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={}", max_age.max(0))?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        match self.same_site {
            Some(SameSite::Lax) => f.write_str("; SameSite=Lax"),
            Some(SameSite::Strict) => f.write_str("; SameSite=Strict"),
            Some(SameSite::None) => f.write_str("; SameSite=None"),
            None => Ok(()),
        }
    }
}
