//! Typed response writers.
//!
//! Every writer merges a body and a content type into the current response;
//! status, headers and cookies set earlier in the chain are kept.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use super::{Context, Response};
use crate::error::{Error, HandlerResult};
use crate::mime;

/// Read-only source of named static files, such as assets compiled into the
/// binary with `include_bytes!`.
pub trait AssetSource: Send + Sync {
    fn get(&self, name: &str) -> Option<Cow<'static, [u8]>>;
}

/// Assets held in memory, usually from `include_bytes!`.
///
/// ```rust
/// use brrtweb::context::{AssetSource, EmbeddedAssets};
///
/// let assets = EmbeddedAssets::new().with("robots.txt", b"User-agent: *");
/// assert!(assets.get("robots.txt").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmbeddedAssets {
    files: HashMap<String, &'static [u8]>,
}

impl EmbeddedAssets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &str, bytes: &'static [u8]) -> Self {
        self.files.insert(name.trim_start_matches('/').to_string(), bytes);
        self
    }
}

impl AssetSource for EmbeddedAssets {
    fn get(&self, name: &str) -> Option<Cow<'static, [u8]>> {
        self.files
            .get(name.trim_start_matches('/'))
            .map(|b| Cow::Borrowed(*b))
    }
}

/// Assets read from a directory on each request.
///
/// Names containing `..` or absolute components are rejected.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for DirAssets {
    fn get(&self, name: &str) -> Option<Cow<'static, [u8]>> {
        let rel = Path::new(name.trim_start_matches('/'));
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        std::fs::read(self.root.join(rel)).ok().map(Cow::Owned)
    }
}

impl Context {
    /// Set the body and content type.
    pub fn binary(&mut self, data: impl Into<Vec<u8>>, content_type: &str) {
        self.write(
            Response::builder()
                .body(data)
                .content_type(content_type)
                .build(),
        );
    }

    pub fn text(&mut self, text: &str) {
        self.binary(text, mime::TEXT);
    }

    /// Serialize `data` as JSON.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] when serialization fails.
    pub fn json<T: Serialize + ?Sized>(&mut self, data: &T) -> HandlerResult {
        let body = serde_json::to_vec(data)?;
        self.binary(body, mime::JSON);
        Ok(())
    }

    pub fn json_text(&mut self, json: &str) {
        self.binary(json, mime::JSON);
    }

    /// Serialize `data` as XML.
    ///
    /// # Errors
    ///
    /// [`Error::Xml`] when serialization fails.
    pub fn xml<T: Serialize + ?Sized>(&mut self, data: &T) -> HandlerResult {
        let body = quick_xml::se::to_string(data)?;
        self.binary(body, mime::XML);
        Ok(())
    }

    pub fn xml_text(&mut self, xml: &str) {
        self.binary(xml, mime::XML);
    }

    pub fn html(&mut self, html: &str) {
        self.binary(html, mime::HTML);
    }

    pub fn css(&mut self, css: &str) {
        self.binary(css, mime::CSS);
    }

    pub fn js(&mut self, js: &str) {
        self.binary(js, mime::JS);
    }

    pub fn image(&mut self, data: impl Into<Vec<u8>>) {
        self.jpg(data);
    }

    pub fn jpg(&mut self, data: impl Into<Vec<u8>>) {
        self.binary(data, mime::JPG);
    }

    pub fn png(&mut self, data: impl Into<Vec<u8>>) {
        self.binary(data, mime::PNG);
    }

    pub fn gif(&mut self, data: impl Into<Vec<u8>>) {
        self.binary(data, mime::GIF);
    }

    pub fn ico(&mut self, data: impl Into<Vec<u8>>) {
        self.binary(data, mime::ICO);
    }

    pub fn bmp(&mut self, data: impl Into<Vec<u8>>) {
        self.binary(data, mime::BMP);
    }

    /// Serve a file from disk.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the file cannot be read.
    pub fn file(&mut self, path: impl AsRef<Path>, content_type: &str) -> HandlerResult {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        self.binary(bytes, content_type);
        Ok(())
    }

    pub fn text_file(&mut self, path: impl AsRef<Path>) -> HandlerResult {
        self.file(path, mime::TEXT)
    }

    pub fn json_file(&mut self, path: impl AsRef<Path>) -> HandlerResult {
        self.file(path, mime::JSON)
    }

    pub fn xml_file(&mut self, path: impl AsRef<Path>) -> HandlerResult {
        self.file(path, mime::XML)
    }

    pub fn html_file(&mut self, path: impl AsRef<Path>) -> HandlerResult {
        self.file(path, mime::HTML)
    }

    pub fn css_file(&mut self, path: impl AsRef<Path>) -> HandlerResult {
        self.file(path, mime::CSS)
    }

    pub fn js_file(&mut self, path: impl AsRef<Path>) -> HandlerResult {
        self.file(path, mime::JS)
    }

    /// Serve a named asset.
    ///
    /// # Errors
    ///
    /// [`Error::AssetNotFound`] when `source` has no such asset.
    pub fn asset(&mut self, source: &dyn AssetSource, name: &str, content_type: &str) -> HandlerResult {
        let bytes = source
            .get(name)
            .ok_or_else(|| Error::AssetNotFound(name.to_string()))?;
        self.binary(bytes.into_owned(), content_type);
        Ok(())
    }

    /// Serve a file as an attachment named `filename`.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the file cannot be read.
    pub fn download(&mut self, path: impl AsRef<Path>, filename: &str) -> HandlerResult {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let disposition = format!("attachment; filename=\"{}\"", urlencoding::encode(filename));
        self.write(
            Response::builder()
                .body(bytes)
                .content_type(mime::BINARY)
                .header("Content-Disposition", &disposition)
                .build(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ListenerRegistry, Templates};
    use crate::server::Request;
    use http::Method;
    use std::sync::Arc;

    fn ctx() -> Context {
        let mut c = Context::new(Arc::new(ListenerRegistry::new()));
        c.allocate(Request::new(Method::GET, "/"), Arc::new(Templates::default()));
        c
    }

    #[derive(Serialize)]
    struct Pet {
        name: String,
        age: u32,
    }

    #[test]
    fn test_text_keeps_status() {
        let mut c = ctx();
        c.status(201);
        c.text("hi");
        assert_eq!(c.response().status, 201);
        assert_eq!(c.response().body_str(), "hi");
        assert_eq!(c.response().content_type, mime::TEXT);
    }

    #[test]
    fn test_json_and_xml() {
        let mut c = ctx();
        let pet = Pet {
            name: "Rex".into(),
            age: 3,
        };
        c.json(&pet).unwrap();
        assert_eq!(c.response().body_str(), r#"{"name":"Rex","age":3}"#);
        assert_eq!(c.response().content_type, mime::JSON);

        c.xml(&pet).unwrap();
        assert_eq!(c.response().body_str(), "<Pet><name>Rex</name><age>3</age></Pet>");
        assert_eq!(c.response().content_type, mime::XML);
    }

    #[test]
    fn test_file_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.css");
        std::fs::write(&path, "body{}").unwrap();

        let mut c = ctx();
        c.css_file(&path).unwrap();
        assert_eq!(c.response().body_str(), "body{}");
        assert_eq!(c.response().content_type, mime::CSS);

        let err = c.file(dir.path().join("nope"), mime::TEXT).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_assets() {
        let assets = EmbeddedAssets::new().with("/static/app.js", b"let x;");
        let mut c = ctx();
        c.asset(&assets, "static/app.js", mime::JS).unwrap();
        assert_eq!(c.response().body_str(), "let x;");
        assert!(matches!(
            c.asset(&assets, "missing.js", mime::JS),
            Err(Error::AssetNotFound(_))
        ));
    }

    #[test]
    fn test_dir_assets_reject_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.txt"), "ok").unwrap();
        let assets = DirAssets::new(dir.path());
        assert_eq!(assets.get("ok.txt").as_deref(), Some(&b"ok"[..]));
        assert!(assets.get("../ok.txt").is_none());
    }

    #[test]
    fn test_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.bin");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let mut c = ctx();
        c.download(&path, "my report.bin").unwrap();
        let r = c.response();
        assert_eq!(r.body.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(r.content_type, mime::BINARY);
        assert_eq!(
            r.header("content-disposition"),
            Some("attachment; filename=\"my%20report.bin\"")
        );
    }
}
