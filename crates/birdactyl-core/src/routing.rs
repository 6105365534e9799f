//! Route patterns and matching.
//!
//! A pattern is either a literal path or a literal prefix followed by a
//! single trailing `*`. There is no other pattern syntax. Methods compare
//! exactly, so `get` and `GET` are different selectors.

use serde::{Deserialize, Serialize};

/// Method selector matching every HTTP method.
pub const ANY_METHOD: &str = "*";

/// Trailing marker turning a path into a prefix pattern.
pub const WILDCARD: char = '*';

/// Builds the exact lookup key for a method and path.
pub fn route_key(method: &str, path: &str) -> String {
    format!("{method}:{path}")
}

/// A parsed path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    Prefix(String),
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix(WILDCARD) {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == path,
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

/// Route metadata reported to the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub method: String,
    pub path: String,
}

/// A registered route selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    info: RouteInfo,
    pattern: PathPattern,
}

impl RouteEntry {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            info: RouteInfo {
                method: method.to_string(),
                path: path.to_string(),
            },
            pattern: PathPattern::parse(path),
        }
    }

    pub fn key(&self) -> String {
        route_key(&self.info.method, &self.info.path)
    }

    pub fn info(&self) -> &RouteInfo {
        &self.info
    }

    /// Whether this route accepts the method and path.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        let method_ok = self.info.method == ANY_METHOD || self.info.method == method;
        method_ok && (self.info.path == path || self.pattern.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_prefix() {
        let entry = RouteEntry::new("GET", "/files/*");
        assert!(entry.matches("GET", "/files/a/b"));
        assert!(entry.matches("GET", "/files/"));
        assert!(!entry.matches("GET", "/file"));
        assert!(!entry.matches("POST", "/files/a"));
    }

    #[test]
    fn test_any_method() {
        let entry = RouteEntry::new("*", "/health");
        assert!(entry.matches("GET", "/health"));
        assert!(entry.matches("DELETE", "/health"));
        assert!(!entry.matches("GET", "/health/x"));
    }

    #[test]
    fn test_method_compares_exactly() {
        let entry = RouteEntry::new("POST", "/echo");
        assert_eq!(entry.key(), "POST:/echo");
        assert!(entry.matches("POST", "/echo"));
        assert!(!entry.matches("post", "/echo"));

        let lower = RouteEntry::new("post", "/echo");
        assert_eq!(lower.info().method, "post");
        assert!(!lower.matches("POST", "/echo"));
    }
}
