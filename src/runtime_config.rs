//! Coroutine runtime settings from the environment.
//!
//! ## Environment Variables
//!
//! ### `BRRTWEB_STACK_SIZE`
//!
//! Stack size of request coroutines, decimal (`32768`) or hex (`0x8000`).
//! Default: `0x8000` (32 KB). Template rendering and deep middleware chains
//! need more than the `may` default; very small stacks overflow.
//!
//! ### `BRRTWEB_WORKERS`
//!
//! Number of `may` worker threads. Default: the `may` default (one per CPU).
//!
//! ```rust
//! use brrtweb::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! assert!(config.stack_size > 0);
//! ```

use std::env;

use tracing::info;

pub const DEFAULT_STACK_SIZE: usize = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Coroutine stack size in bytes
    pub stack_size: usize,
    /// `may` worker threads; `None` keeps the runtime default
    pub workers: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            workers: None,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(
            env::var("BRRTWEB_STACK_SIZE").ok().as_deref(),
            env::var("BRRTWEB_WORKERS").ok().as_deref(),
        )
    }

    fn from_vars(stack_size: Option<&str>, workers: Option<&str>) -> Self {
        Self {
            stack_size: stack_size
                .and_then(parse_size)
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_STACK_SIZE),
            workers: workers
                .and_then(|w| w.trim().parse().ok())
                .filter(|n: &usize| *n > 0),
        }
    }

    /// Configure the global `may` runtime. Call before the first coroutine
    /// is spawned.
    pub fn apply(&self) {
        let cfg = may::config();
        cfg.set_stack_size(self.stack_size);
        if let Some(workers) = self.workers {
            cfg.set_workers(workers);
        }
        info!(
            stack_size = self.stack_size,
            workers = ?self.workers,
            "Coroutine runtime configured"
        );
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(RuntimeConfig::from_vars(None, None), RuntimeConfig::default());
    }

    #[test]
    fn test_hex_and_decimal_stack_size() {
        assert_eq!(RuntimeConfig::from_vars(Some("0x4000"), None).stack_size, 0x4000);
        assert_eq!(RuntimeConfig::from_vars(Some("65536"), None).stack_size, 65536);
        assert_eq!(
            RuntimeConfig::from_vars(Some("lots"), None).stack_size,
            DEFAULT_STACK_SIZE
        );
    }

    #[test]
    fn test_workers() {
        assert_eq!(RuntimeConfig::from_vars(None, Some("4")).workers, Some(4));
        assert_eq!(RuntimeConfig::from_vars(None, Some("0")).workers, None);
        assert_eq!(RuntimeConfig::from_vars(None, Some("x")).workers, None);
    }
}
