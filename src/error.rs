//! Error types surfaced by request handlers and context operations.
//!
//! Handlers return [`HandlerResult`]; every fallible context operation
//! (binding, file and asset serving, templates, serialization) returns an
//! [`Error`] that the handler propagates with `?`. The recovery middleware is
//! the catch boundary that turns these into a JSON 500 response.

use std::fmt;
use std::path::PathBuf;

/// Result type returned by every handler in a chain.
pub type HandlerResult = Result<(), Error>;

/// Request-time failure raised by a context operation or a handler.
#[derive(Debug)]
pub enum Error {
    /// JSON (de)serialization failed.
    Json(serde_json::Error),
    /// XML (de)serialization failed.
    Xml(String),
    /// YAML deserialization failed.
    Yaml(serde_yaml::Error),
    /// Reading a file from disk failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// An embedded asset was not found in its source.
    AssetNotFound(String),
    /// Template parsing or rendering failed.
    Template(minijinja::Error),
    /// The request body could not be parsed as `multipart/form-data`.
    Multipart(String),
    /// A parameter was present but could not be parsed.
    InvalidParam { name: String, value: String },
    /// Free-form failure raised by handler code.
    Custom(String),
}

impl Error {
    /// Build an [`Error::Custom`] from any message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Error::Custom(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Json(e) => write!(f, "json error: {e}"),
            Error::Xml(e) => write!(f, "xml error: {e}"),
            Error::Yaml(e) => write!(f, "yaml error: {e}"),
            Error::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Error::AssetNotFound(name) => write!(f, "asset not found: {name}"),
            Error::Template(e) => write!(f, "template error: {e}"),
            Error::Multipart(e) => write!(f, "multipart error: {e}"),
            Error::InvalidParam { name, value } => {
                write!(f, "invalid value for parameter {name}: {value:?}")
            }
            Error::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(e) => Some(e),
            Error::Yaml(e) => Some(e),
            Error::Io { source, .. } => Some(source),
            Error::Template(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Yaml(e)
    }
}

impl From<minijinja::Error> for Error {
    fn from(e: minijinja::Error) -> Self {
        Error::Template(e)
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(e: quick_xml::DeError) -> Self {
        Error::Xml(e.to_string())
    }
}

impl From<quick_xml::SeError> for Error {
    fn from(e: quick_xml::SeError) -> Self {
        Error::Xml(e.to_string())
    }
}
