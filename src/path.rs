//! Path normalization shared by route registration and request matching.
//!
//! Registered patterns are cleaned with [`trim_special_chars`] and then
//! [`normalize`]d; live request paths are only normalized (after percent
//! decoding), never character-filtered.

/// Collapse a path into its canonical form.
///
/// Splits on `/`, trims whitespace from every segment, drops empty segments
/// and rejoins with a single leading slash. Empty input yields `/`.
///
/// ```
/// use brrtweb::path::normalize;
///
/// assert_eq!(normalize("//a// b /"), "/a/b");
/// assert_eq!(normalize(""), "/");
/// ```
#[must_use]
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/').map(str::trim).filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Strip every character outside `[A-Za-z0-9_./{}-]` from a route pattern,
/// then [`normalize`] it.
///
/// ```
/// use brrtweb::path::trim_special_chars;
///
/// assert_eq!(trim_special_chars("/us*ers/{id}!"), "/users/{id}");
/// ```
#[must_use]
pub fn trim_special_chars(pattern: &str) -> String {
    let cleaned: String = pattern
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '{' | '}' | '-'))
        .collect();
    normalize(&cleaned)
}

/// Join a group prefix and a route path into one normalized path.
#[must_use]
pub fn join(prefix: &str, path: &str) -> String {
    let mut joined = String::with_capacity(prefix.len() + path.len() + 1);
    joined.push_str(prefix);
    joined.push('/');
    joined.push_str(path);
    normalize(&joined)
}
