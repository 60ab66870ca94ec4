//! Route table - hot path for request routing.
//!
//! Two tiers: an exact `METHOD:path` map consulted first, then per-method
//! regex entries tried in registration order. The table is built once and
//! shared read-only between connections.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use super::{Group, Router};
use crate::context::Handler;
use crate::path::{join, normalize};

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated path parameter storage for the hot path.
///
/// Names are shared with the route entry (`Arc<str>`); values are per-request.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of resolving a request to a route.
#[derive(Clone)]
pub struct RouteMatch {
    pub handler: Handler,
    /// Values bound to the route's placeholder names, in capture order.
    pub params: ParamVec,
    /// Exact path or anchored regex that matched.
    pub pattern: Arc<str>,
}

impl RouteMatch {
    /// Get a path parameter by name.
    ///
    /// Uses "last write wins" semantics when a name repeats in the pattern.
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("params", &self.params)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

struct DynamicEntry {
    pattern: Arc<str>,
    regex: Regex,
    params: Vec<Arc<str>>,
    handler: Handler,
}

/// Merged, read-only routing table.
#[derive(Default)]
pub struct RouteTable {
    exact: HashMap<String, (Arc<str>, Handler)>,
    dynamic: HashMap<Method, Vec<DynamicEntry>>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge groups, then routers, into a new table.
    ///
    /// A group with an empty prefix contributes its routers unchanged, after
    /// the prefixed groups and before `routers`. When two registrations share
    /// a key the later one wins.
    #[must_use]
    pub fn build(routers: &[Router], groups: &[Group]) -> Self {
        let mut table = Self::new();
        let mut unprefixed: Vec<&Router> = Vec::new();

        for group in groups {
            for router in group.routers() {
                if group.prefix().is_empty() {
                    unprefixed.push(router);
                } else {
                    table.merge(group.prefix(), router);
                }
            }
        }
        for router in unprefixed.into_iter().chain(routers.iter()) {
            table.merge("", router);
        }

        let summary: Vec<String> = table.routes().into_iter().take(10).collect();
        info!(
            exact_routes = table.exact.len(),
            dynamic_routes = table.dynamic.values().map(Vec::len).sum::<usize>(),
            routes_summary = ?summary,
            "Routing table loaded"
        );
        table
    }

    /// Copy a router's entries into the table with `prefix` prepended.
    pub fn merge(&mut self, prefix: &str, router: &Router) {
        for route in router.exact_routes() {
            let path = join(prefix, &route.path);
            self.insert_exact(&route.method, &path, Arc::clone(&route.handler));
        }
        for route in router.dynamic_routes() {
            let mut pattern = String::with_capacity(prefix.len() + route.pattern.len() + 2);
            pattern.push('^');
            pattern.push_str(&regex::escape(prefix));
            pattern.push_str(&route.pattern);
            pattern.push('$');
            if let Err(e) = self.insert_dynamic(
                &route.method,
                pattern,
                route.params.clone(),
                Arc::clone(&route.handler),
            ) {
                warn!(method = %route.method, pattern = %route.pattern, error = %e, "Skipping dynamic route");
            }
        }
    }

    /// Insert or overwrite an exact entry.
    pub fn insert_exact(&mut self, method: &Method, path: &str, handler: Handler) {
        let path = normalize(path);
        let key = exact_key(method, &path);
        self.exact.insert(key, (Arc::from(path.as_str()), handler));
    }

    /// Insert a dynamic entry for an anchored pattern.
    ///
    /// An entry with the same pattern string for the same method is replaced
    /// in place, keeping its original position in the matching order.
    ///
    /// # Errors
    ///
    /// Returns the regex compile error for an invalid pattern.
    pub fn insert_dynamic(
        &mut self,
        method: &Method,
        pattern: String,
        params: Vec<Arc<str>>,
        handler: Handler,
    ) -> Result<(), regex::Error> {
        let regex = Regex::new(&pattern)?;
        let entry = DynamicEntry {
            pattern: Arc::from(pattern.as_str()),
            regex,
            params,
            handler,
        };
        let entries = self.dynamic.entry(method.clone()).or_default();
        match entries.iter_mut().find(|e| e.pattern.as_ref() == pattern) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    /// Resolve a request to its handler.
    ///
    /// The path is percent-decoded and normalized first. Exact entries always
    /// take precedence; dynamic entries are tried in registration order and
    /// an entry whose capture count differs from its parameter count is
    /// skipped.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let start = Instant::now();
        let decoded = urlencoding::decode(path).unwrap_or(std::borrow::Cow::Borrowed(path));
        let path = normalize(&decoded);

        let result = self.resolve_exact(method, &path).or_else(|| self.resolve_dynamic(method, &path));

        let elapsed = start.elapsed();
        match &result {
            Some(m) if elapsed > Duration::from_millis(1) => warn!(
                method = %method,
                path = %path,
                route_pattern = %m.pattern,
                duration_us = elapsed.as_micros(),
                "Slow route matching detected"
            ),
            Some(m) => debug!(
                method = %method,
                path = %path,
                route_pattern = %m.pattern,
                path_params = ?m.params,
                duration_us = elapsed.as_micros(),
                "Route matched"
            ),
            None => debug!(method = %method, path = %path, "No route matched"),
        }
        result
    }

    fn resolve_exact(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let (pattern, handler) = self.exact.get(&exact_key(method, path))?;
        Some(RouteMatch {
            handler: Arc::clone(handler),
            params: ParamVec::new(),
            pattern: Arc::clone(pattern),
        })
    }

    fn resolve_dynamic(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        for entry in self.dynamic.get(method)? {
            if entry.regex.captures_len() != entry.params.len() + 1 {
                continue;
            }
            let Some(caps) = entry.regex.captures(path) else {
                continue;
            };
            let params = entry
                .params
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    caps.get(i + 1)
                        .map(|m| (Arc::clone(name), m.as_str().to_owned()))
                })
                .collect();
            return Some(RouteMatch {
                handler: Arc::clone(&entry.handler),
                params,
                pattern: Arc::clone(&entry.pattern),
            });
        }
        None
    }

    /// `METHOD path` lines for every entry, exact routes first, for logging.
    #[must_use]
    pub fn routes(&self) -> Vec<String> {
        let mut exact: Vec<String> = self.exact.keys().map(|k| k.replacen(':', " ", 1)).collect();
        exact.sort();
        let mut dynamic: Vec<String> = self
            .dynamic
            .iter()
            .flat_map(|(m, entries)| entries.iter().map(move |e| format!("{m} {}", e.pattern)))
            .collect();
        dynamic.sort();
        exact.extend(dynamic);
        exact
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exact.len() + self.dynamic.values().map(Vec::len).sum::<usize>()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn exact_key(method: &Method, path: &str) -> String {
    let mut key = String::with_capacity(method.as_str().len() + path.len() + 1);
    key.push_str(method.as_str());
    key.push(':');
    key.push_str(path);
    key
}
