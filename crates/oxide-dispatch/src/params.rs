//! Route parameters and URL splitting.

use std::collections::HashMap;

use serde::Serialize;
use url::Url;

use crate::error::{DispatchError, Result};

/// Base used to resolve relative URLs such as `/items/5?x=1`.
const RELATIVE_BASE: &str = "http://localhost/";

/// The parts of a URL the router cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    /// Percent-encoded path, always starting with `/`.
    pub path: String,
    /// Decoded query string pairs.
    pub query: HashMap<String, String>,
    /// Fragment without the leading `#`.
    pub hash: Option<String>,
}

impl UrlParts {
    /// Splits an absolute or root-relative URL.
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(RELATIVE_BASE)
                .and_then(|base| base.join(url))
                .map_err(|e| DispatchError::InvalidArgument(format!("bad url {url:?}: {e}")))?,
            Err(e) => {
                return Err(DispatchError::InvalidArgument(format!(
                    "bad url {url:?}: {e}"
                )))
            }
        };

        Ok(Self {
            path: parsed.path().to_string(),
            query: parsed.query_pairs().into_owned().collect(),
            hash: parsed.fragment().map(str::to_string),
        })
    }
}

/// Parameters resolved for the current URL.
///
/// Values keep the declaration order of the route pattern, so they can be
/// read positionally as well as by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Params {
    values: Vec<(String, String)>,
    /// Query string parameters.
    pub query: HashMap<String, String>,
    /// URL fragment.
    pub hash: Option<String>,
}

impl Params {
    /// Creates new empty params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.push((key.into(), value.into()));
    }

    /// Gets a parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Gets a parameter by position.
    pub fn at(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(|(_, v)| v.as_str())
    }

    /// Parses a parameter as a specific type.
    pub fn parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Returns the values in order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(_, v)| v.as_str())
    }

    /// Returns an iterator over the named parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of path parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when there are no path parameters.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Gets a query parameter.
    pub fn get_query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_relative_url() {
        let parts = UrlParts::parse("/items/5?sort=name&q=a+b#top").unwrap();
        assert_eq!(parts.path, "/items/5");
        assert_eq!(parts.query.get("sort"), Some(&"name".to_string()));
        assert_eq!(parts.query.get("q"), Some(&"a b".to_string()));
        assert_eq!(parts.hash.as_deref(), Some("top"));
    }

    #[test]
    fn test_split_absolute_url() {
        let parts = UrlParts::parse("https://example.com/posts").unwrap();
        assert_eq!(parts.path, "/posts");
        assert!(parts.query.is_empty());
        assert_eq!(parts.hash, None);
    }

    #[test]
    fn test_params_access() {
        let mut params = Params::new();
        params.push("id", "123");
        params.push("name", "test");

        assert_eq!(params.get("id"), Some("123"));
        assert_eq!(params.at(1), Some("test"));
        assert_eq!(params.parse::<i64>("id"), Some(123));
        assert_eq!(params.values().collect::<Vec<_>>(), vec!["123", "test"]);
        assert_eq!(params.get("missing"), None);
    }
}
