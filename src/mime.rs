//! Content-type constants used by the response writers.

pub const TEXT: &str = "text/plain;charset=utf-8";
pub const HTML: &str = "text/html;charset=utf-8";
pub const JS: &str = "text/javascript;charset=utf-8";
pub const CSS: &str = "text/css;charset=utf-8";
pub const JSON: &str = "application/json;charset=utf-8";
pub const XML: &str = "application/xml;charset=utf-8";
pub const YAML: &str = "application/yaml;charset=utf-8";

pub const BMP: &str = "image/bmp";
pub const JPG: &str = "image/jpg";
pub const PNG: &str = "image/png";
pub const GIF: &str = "image/gif";
pub const ICO: &str = "image/ico";

pub const ZIP: &str = "application/zip";
pub const TAR: &str = "application/x-tar";
pub const GZIP: &str = "application/x-gzip";

pub const BINARY: &str = "application/octet-stream";

pub const FORM: &str = "application/x-www-form-urlencoded";
pub const MULTIPART: &str = "multipart/form-data";

/// Return the media type of a content-type value without parameters,
/// lowercased (`"Application/JSON; charset=utf-8"` → `"application/json"`).
#[must_use]
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_essence() {
        assert_eq!(essence(JSON), "application/json");
        assert_eq!(essence("Text/HTML ; charset=utf-8"), "text/html");
        assert_eq!(essence(""), "");
    }
}
