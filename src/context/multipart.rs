use std::collections::HashMap;
use std::path::Path;

use super::Context;
use crate::error::{Error, HandlerResult};
use crate::mime;

/// A file uploaded in a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl MultipartFile {
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write the file contents to `path`.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        std::fs::write(path, &self.data).map_err(|e| Error::io(path, e))
    }
}

impl Context {
    /// Parse a `multipart/form-data` body.
    ///
    /// Plain fields are merged into the parameter map (one entry per field
    /// name, replacing earlier values) and files become available through
    /// [`Context::multipart_file`].
    ///
    /// # Errors
    ///
    /// [`Error::Multipart`] when the request is not multipart, the body is
    /// larger than `max_memory` bytes, or the body is malformed.
    pub fn parse_multipart(&mut self, max_memory: usize) -> HandlerResult {
        let content_type = self.request().content_type().to_string();
        if mime::essence(&content_type) != mime::MULTIPART {
            return Err(Error::Multipart("request is not multipart/form-data".into()));
        }
        let boundary = boundary(&content_type)
            .ok_or_else(|| Error::Multipart("missing boundary".into()))?;
        if self.request().body.len() > max_memory {
            return Err(Error::Multipart(format!(
                "body of {} bytes exceeds limit of {max_memory} bytes",
                self.request().body.len()
            )));
        }

        let parts = parse_parts(&self.request().body, &boundary)?;
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for part in parts {
            match part.filename {
                Some(filename) => {
                    self.files
                        .entry(part.name.clone())
                        .or_default()
                        .push(MultipartFile {
                            field: part.name,
                            filename,
                            content_type: part
                                .content_type
                                .unwrap_or_else(|| mime::BINARY.to_string()),
                            data: part.data,
                        });
                }
                None => values
                    .entry(part.name)
                    .or_default()
                    .push(String::from_utf8_lossy(&part.data).into_owned()),
            }
        }
        self.set_param_map(values, false);
        Ok(())
    }

    /// First file uploaded under `name`.
    #[must_use]
    pub fn multipart_file(&self, name: &str) -> Option<&MultipartFile> {
        self.files.get(name).and_then(|f| f.first())
    }

    /// Every file uploaded under `name`.
    #[must_use]
    pub fn multipart_files(&self, name: &str) -> &[MultipartFile] {
        self.files.get(name).map_or(&[], Vec::as_slice)
    }
}

struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

fn boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (k, v) = param.trim().split_once('=')?;
        k.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| v.trim().trim_matches('"').to_string())
            .filter(|b| !b.is_empty())
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

fn parse_parts(body: &[u8], boundary: &str) -> Result<Vec<Part>, Error> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut close = b"\r\n".to_vec();
    close.extend_from_slice(&delimiter);

    let malformed = |why: &str| Error::Multipart(format!("malformed body: {why}"));
    let mut pos = find(body, &delimiter, 0).ok_or_else(|| malformed("no opening boundary"))?;
    let mut parts = Vec::new();

    loop {
        pos += delimiter.len();
        if body[pos..].starts_with(b"--") {
            return Ok(parts);
        }
        if !body[pos..].starts_with(b"\r\n") {
            return Err(malformed("boundary not followed by CRLF"));
        }
        pos += 2;

        let head_end = find(body, b"\r\n\r\n", pos).ok_or_else(|| malformed("unterminated part headers"))?;
        let head = String::from_utf8_lossy(&body[pos..head_end]);
        let data_start = head_end + 4;
        let data_end = find(body, &close, data_start).ok_or_else(|| malformed("unterminated part"))?;

        let mut name = None;
        let mut filename = None;
        let mut content_type = None;
        for line in head.split("\r\n") {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "content-disposition" => {
                    for attr in value.split(';').skip(1) {
                        if let Some((k, v)) = attr.trim().split_once('=') {
                            let v = v.trim().trim_matches('"').to_string();
                            match k.trim() {
                                "name" => name = Some(v),
                                "filename" => filename = Some(v),
                                _ => {}
                            }
                        }
                    }
                }
                "content-type" => content_type = Some(value.trim().to_string()),
                _ => {}
            }
        }

        parts.push(Part {
            name: name.ok_or_else(|| malformed("part without a name"))?,
            filename,
            content_type,
            data: body[data_start..data_end].to_vec(),
        });
        pos = data_end + 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ListenerRegistry, Templates};
    use crate::server::Request;
    use http::Method;
    use std::sync::Arc;

    const BODY: &str = "--XyZ\r\n\
        Content-Disposition: form-data; name=\"title\"\r\n\
        \r\n\
        hello\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        file body\r\n\
        --XyZ--\r\n";

    fn ctx_with(content_type: &str, body: &str) -> Context {
        let mut ctx = Context::new(Arc::new(ListenerRegistry::new()));
        let req = Request::new(Method::POST, "/upload")
            .with_header("Content-Type", content_type)
            .with_body(body);
        ctx.allocate(req, Arc::new(Templates::default()));
        ctx
    }

    #[test]
    fn test_boundary() {
        assert_eq!(
            boundary("multipart/form-data; boundary=\"ab c\"").as_deref(),
            Some("ab c")
        );
        assert_eq!(boundary("multipart/form-data"), None);
    }

    #[test]
    fn test_parse_multipart() {
        let mut ctx = ctx_with("multipart/form-data; boundary=XyZ", BODY);
        ctx.parse_multipart(1 << 20).unwrap();
        assert_eq!(ctx.param("title"), "hello");
        let f = ctx.multipart_file("upload").unwrap();
        assert_eq!(f.filename, "a.txt");
        assert_eq!(f.content_type, "text/plain");
        assert_eq!(f.data, b"file body");
        assert_eq!(ctx.multipart_files("upload").len(), 1);
        assert!(ctx.multipart_file("none").is_none());
    }

    #[test]
    fn test_save_file() {
        let mut ctx = ctx_with("multipart/form-data; boundary=XyZ", BODY);
        ctx.parse_multipart(1 << 20).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("saved.txt");
        ctx.multipart_file("upload").unwrap().save(&dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"file body");
    }

    #[test]
    fn test_rejects_non_multipart_and_oversized() {
        let mut ctx = ctx_with("application/json", "{}");
        assert!(matches!(ctx.parse_multipart(1024), Err(Error::Multipart(_))));

        let mut ctx = ctx_with("multipart/form-data; boundary=XyZ", BODY);
        assert!(matches!(ctx.parse_multipart(8), Err(Error::Multipart(_))));
    }

    #[test]
    fn test_malformed_body() {
        let mut ctx = ctx_with("multipart/form-data; boundary=XyZ", "--XyZ\r\nno headers");
        assert!(ctx.parse_multipart(1024).is_err());
    }
}
