//! Application configuration.
//!
//! [`AppConfig`] is loaded from a YAML (`.yaml`/`.yml`) or TOML (`.toml`)
//! file, then overridden from `BRRTWEB_*` environment variables. Every field
//! has a default, so an empty file, or no file at all, is valid.
//!
//! ```yaml
//! server:
//!   host: 127.0.0.1
//!   port: 8080
//!   max_body_size: 1048576
//! template:
//!   cache: false
//!   root: views
//! pool:
//!   max_idle: 256
//! ```

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Names the file [`AppConfig::from_env`] loads.
pub const CONFIG_FILE_ENV: &str = "BRRTWEB_CONFIG_FILE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub template: TemplateConfig,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request head in bytes; larger heads get `431`.
    pub max_header_size: usize,
    /// Largest accepted request body in bytes; larger bodies get `413`.
    pub max_body_size: usize,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    /// How long a keep-alive connection may sit idle between requests.
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9494,
            max_header_size: 1 << 20,
            max_body_size: 8 << 20,
            read_timeout_secs: 60,
            write_timeout_secs: 60,
            idle_timeout_secs: 1,
        }
    }
}

impl ServerConfig {
    /// `host:port`
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parsed listen address.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when `host:port` is not a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = self.address();
        addr.parse().map_err(|_| ConfigError::Invalid {
            key: "server.host".to_string(),
            value: addr,
        })
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Template loading settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Keep loaded template sources in memory.
    pub cache: bool,
    pub root: PathBuf,
    pub suffix: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            cache: true,
            root: PathBuf::from("templates"),
            suffix: ".html".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle contexts kept for reuse.
    pub max_idle: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: crate::context::DEFAULT_MAX_IDLE,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Yaml(serde_yaml::Error),
    Toml(toml::de::Error),
    UnsupportedFormat(PathBuf),
    Invalid {
        key: String,
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config {}: {source}", path.display())
            }
            ConfigError::Yaml(e) => write!(f, "invalid YAML config: {e}"),
            ConfigError::Toml(e) => write!(f, "invalid TOML config: {e}"),
            ConfigError::UnsupportedFormat(path) => write!(
                f,
                "unsupported config format {} (expected .yaml, .yml or .toml)",
                path.display()
            ),
            ConfigError::Invalid { key, value } => write!(f, "invalid value {value:?} for {key}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Yaml(e) => Some(e),
            ConfigError::Toml(e) => Some(e),
            _ => None,
        }
    }
}

impl AppConfig {
    /// Load a config file, choosing the format by extension.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml" | "yml") => Self::from_yaml(&text),
            Some("toml") => Self::from_toml(&text),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// # Errors
    ///
    /// [`ConfigError::Yaml`] on malformed input.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(ConfigError::Yaml)
    }

    /// # Errors
    ///
    /// [`ConfigError::Toml`] on malformed input.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::Toml)
    }

    /// Load the file named by `BRRTWEB_CONFIG_FILE` (defaults when unset),
    /// then apply environment overrides.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the named file cannot be loaded.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim())?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `BRRTWEB_SERVER_*` and `BRRTWEB_TEMPLATE_*`
    /// variables. Unparsable values are logged and ignored.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| env::var(key).ok());
    }

    fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn set<T: std::str::FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
            if let Some(raw) = lookup(key) {
                match raw.trim().parse() {
                    Ok(v) => *slot = v,
                    Err(_) => warn!(key, value = %raw, "Ignoring unparsable config override"),
                }
            }
        }

        let lookup: &dyn Fn(&str) -> Option<String> = &lookup;
        let s = &mut self.server;
        if let Some(host) = lookup("BRRTWEB_SERVER_HOST").filter(|h| !h.trim().is_empty()) {
            s.host = host.trim().to_string();
        }
        set(lookup, "BRRTWEB_SERVER_PORT", &mut s.port);
        set(lookup, "BRRTWEB_SERVER_MAX_HEADER_SIZE", &mut s.max_header_size);
        set(lookup, "BRRTWEB_SERVER_MAX_BODY_SIZE", &mut s.max_body_size);
        set(lookup, "BRRTWEB_SERVER_READ_TIMEOUT_SECS", &mut s.read_timeout_secs);
        set(lookup, "BRRTWEB_SERVER_WRITE_TIMEOUT_SECS", &mut s.write_timeout_secs);
        set(lookup, "BRRTWEB_SERVER_IDLE_TIMEOUT_SECS", &mut s.idle_timeout_secs);

        let t = &mut self.template;
        set(lookup, "BRRTWEB_TEMPLATE_CACHE", &mut t.cache);
        if let Some(root) = lookup("BRRTWEB_TEMPLATE_ROOT").filter(|r| !r.trim().is_empty()) {
            t.root = PathBuf::from(root.trim());
        }
        if let Some(suffix) = lookup("BRRTWEB_TEMPLATE_SUFFIX") {
            t.suffix = suffix.trim().to_string();
        }
    }
}
