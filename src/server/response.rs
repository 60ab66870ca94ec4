#![deny(
    clippy::inefficient_to_string,
    clippy::format_push_string,
    clippy::unnecessary_to_owned
)]

use std::io::Write;

use chrono::Utc;
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, DATE};
use http::StatusCode;

use crate::context::Response;

fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Statuses that never carry a body.
fn bodyless(status: u16) -> bool {
    (100..200).contains(&status) || status == 204 || status == 304
}

/// Serialize `response` as an HTTP/1.1 message.
///
/// Every header is written, then `Content-Type` when the response has one,
/// one `Set-Cookie` per cookie, `Date` unless already set, `Connection` and
/// `Content-Length`. Status `0` is sent as `200`. With `head_only` the body
/// is left out but `Content-Length` still reports its size.
#[must_use]
pub fn encode(response: &Response, head_only: bool, keep_alive: bool) -> Vec<u8> {
    let status = if response.status == 0 { 200 } else { response.status };
    let body = response.body.as_deref().unwrap_or_default();
    let mut out = Vec::with_capacity(256 + body.len());

    // Writes into a Vec cannot fail
    let _ = write!(out, "HTTP/1.1 {status} {}\r\n", status_reason(status));
    for (name, value) in &response.headers {
        let skip = *name == CONTENT_LENGTH
            || *name == CONNECTION
            || (*name == CONTENT_TYPE && !response.content_type.is_empty());
        if skip {
            continue;
        }
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    if !response.content_type.is_empty() {
        let _ = write!(out, "Content-Type: {}\r\n", response.content_type);
    }
    for cookie in &response.cookies {
        let _ = write!(out, "Set-Cookie: {cookie}\r\n");
    }
    if !response.headers.contains_key(DATE) {
        let _ = write!(
            out,
            "Date: {}\r\n",
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT")
        );
    }
    out.extend_from_slice(if keep_alive {
        b"Connection: keep-alive\r\n"
    } else {
        b"Connection: close\r\n"
    });
    if !bodyless(status) {
        let _ = write!(out, "Content-Length: {}\r\n", body.len());
    }
    out.extend_from_slice(b"\r\n");
    if !head_only && !bodyless(status) {
        out.extend_from_slice(body);
    }
    out
}

/// A bare response for transport-level failures (`400`, `413`, `431`, ...).
#[must_use]
pub fn plain(status: u16) -> Response {
    let mut response = Response {
        status,
        ..Response::default()
    };
    response.body = Some(format!("{status} {}", status_reason(status).to_lowercase()).into_bytes());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Cookie;
    use http::HeaderValue;

    fn text(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(431), "Request Header Fields Too Large");
        assert_eq!(status_reason(599), "Unknown");
    }

    #[test]
    fn test_encode_full_response() {
        let mut r = Response {
            status: 201,
            body: Some(b"{}".to_vec()),
            content_type: "application/json".into(),
            ..Response::default()
        };
        r.headers.append("x-a", HeaderValue::from_static("1"));
        r.headers.append("x-a", HeaderValue::from_static("2"));
        r.headers.insert("content-type", HeaderValue::from_static("text/ignored"));
        r.cookies.push(Cookie::new("sid", "abc").path("/"));

        let out = text(&encode(&r, false, true));
        assert!(out.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(out.contains("x-a: 1\r\nx-a: 2\r\n"));
        assert!(out.contains("Content-Type: application/json\r\n"));
        assert!(!out.contains("text/ignored"));
        assert!(out.contains("Set-Cookie: sid=abc; Path=/\r\n"));
        assert!(out.contains("Date: "));
        assert!(out.contains("Connection: keep-alive\r\n"));
        assert!(out.ends_with("Content-Length: 2\r\n\r\n{}"));
    }

    #[test]
    fn test_zero_status_and_head() {
        let r = Response {
            status: 0,
            body: Some(b"hello".to_vec()),
            ..Response::default()
        };
        let out = text(&encode(&r, true, false));
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("Connection: close\r\n"));
        assert!(out.ends_with("Content-Length: 5\r\n\r\n"));
    }

    #[test]
    fn test_no_content_type_when_empty() {
        let r = Response {
            content_type: String::new(),
            ..Response::default()
        };
        assert!(!text(&encode(&r, false, true)).contains("Content-Type"));
    }

    #[test]
    fn test_plain() {
        assert_eq!(plain(413).body_str(), "413 payload too large");
    }
}
