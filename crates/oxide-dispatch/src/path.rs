//! Path pattern matching.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{DispatchError, Result};

/// A segment in a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A literal string segment.
    Literal(String),
    /// A parameter segment (e.g., `:id` or `:id?`).
    Param { name: String, optional: bool },
    /// A wildcard segment (matches remainder of path).
    Wildcard(String),
}

/// A compiled path pattern for matching URLs.
#[derive(Debug, Clone)]
pub struct PathPattern {
    /// The original pattern string.
    pattern: String,
    /// Parsed segments.
    segments: Vec<PathSegment>,
    /// Compiled regex for matching.
    regex: Regex,
    /// Parameter names in order.
    param_names: Vec<String>,
}

impl PathPattern {
    /// Parses a path pattern string.
    ///
    /// Pattern syntax:
    /// - `/items` - Literal path
    /// - `/items/:_id` - Path with parameter
    /// - `/items/:_id?` - Optional parameter
    /// - `/files/*path` - Wildcard parameter (matches rest of path)
    ///
    /// # Example
    ///
    /// ```
    /// use oxide_dispatch::PathPattern;
    ///
    /// let pattern = PathPattern::parse("/posts/:id/comments/:comment_id").unwrap();
    /// let values = pattern.match_path("/posts/123/comments/456").unwrap();
    /// assert_eq!(values, vec!["123".to_string(), "456".to_string()]);
    /// ```
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut param_names = Vec::new();
        let mut regex_str = String::from("^");

        for part in pattern.split('/').filter(|s| !s.is_empty()) {
            if let Some(param) = part.strip_prefix(':') {
                let (name, optional) = match param.strip_suffix('?') {
                    Some(name) => (name, true),
                    None => (param, false),
                };
                if name.is_empty() {
                    return Err(DispatchError::InvalidPattern(pattern.to_string()));
                }
                if optional {
                    regex_str.push_str("(?:/([^/]+))?");
                } else {
                    regex_str.push_str("/([^/]+)");
                }
                segments.push(PathSegment::Param {
                    name: name.to_string(),
                    optional,
                });
                param_names.push(name.to_string());
            } else if let Some(name) = part.strip_prefix('*') {
                let name = if name.is_empty() { "path" } else { name };
                regex_str.push_str("/(.*)");
                segments.push(PathSegment::Wildcard(name.to_string()));
                param_names.push(name.to_string());
            } else {
                regex_str.push('/');
                regex_str.push_str(&regex::escape(part));
                segments.push(PathSegment::Literal(part.to_string()));
            }
        }

        regex_str.push_str("/?$");

        let regex = Regex::new(&regex_str)
            .map_err(|e| DispatchError::InvalidPattern(format!("{pattern}: {e}")))?;

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            regex,
            param_names,
        })
    }

    /// Attempts to match a path (without query or hash) against this pattern.
    ///
    /// Returns the decoded parameter values in declaration order. Optional
    /// parameters that are absent yield an empty string.
    pub fn match_path(&self, path: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(path)?;

        let values = (1..=self.param_names.len())
            .map(|i| {
                caps.get(i)
                    .map(|m| decode(m.as_str()))
                    .unwrap_or_default()
            })
            .collect();

        Some(values)
    }

    /// Returns true if the path matches.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Returns the original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the parameter names.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Generates a path from parameters.
    ///
    /// Every required parameter must be present; optional ones are dropped
    /// when missing.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use oxide_dispatch::PathPattern;
    ///
    /// let pattern = PathPattern::parse("/items/:_id").unwrap();
    /// let params: HashMap<String, String> =
    ///     [("_id".to_string(), "5".to_string())]
    ///     .into_iter()
    ///     .collect();
    /// assert_eq!(pattern.reverse(&params).unwrap(), "/items/5");
    /// ```
    pub fn reverse(&self, params: &HashMap<String, String>) -> Result<String> {
        let mut path = String::new();

        for segment in &self.segments {
            match segment {
                PathSegment::Literal(s) => {
                    path.push('/');
                    path.push_str(s);
                }
                PathSegment::Param { name, optional } => match params.get(name) {
                    Some(value) => {
                        path.push('/');
                        path.push_str(&urlencoding::encode(value));
                    }
                    None if *optional => {}
                    None => return Err(self.missing(name)),
                },
                PathSegment::Wildcard(name) => {
                    let value = params.get(name).ok_or_else(|| self.missing(name))?;
                    path.push('/');
                    path.push_str(&urlencoding::encode(value).replace("%2F", "/"));
                }
            }
        }

        if path.is_empty() {
            path.push('/');
        }

        Ok(path)
    }

    fn missing(&self, name: &str) -> DispatchError {
        DispatchError::MissingParameter {
            pattern: self.pattern.clone(),
            param: name.to_string(),
        }
    }
}

fn decode(s: &str) -> String {
    urlencoding::decode(s).map_or_else(|_| s.to_string(), |v| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_literal_path() {
        let pattern = PathPattern::parse("/items").unwrap();
        assert!(pattern.is_match("/items"));
        assert!(pattern.is_match("/items/"));
        assert!(!pattern.is_match("/posts"));
    }

    #[test]
    fn test_root_path() {
        let pattern = PathPattern::parse("/").unwrap();
        assert!(pattern.is_match("/"));
        assert!(!pattern.is_match("/items"));
    }

    #[test]
    fn test_params_in_order() {
        let pattern = PathPattern::parse("/posts/:post_id/comments/:comment_id").unwrap();
        let values = pattern.match_path("/posts/42/comments/7").unwrap();
        assert_eq!(values, vec!["42", "7"]);
        assert_eq!(pattern.param_names(), ["post_id", "comment_id"]);
    }

    #[test]
    fn test_optional_param() {
        let pattern = PathPattern::parse("/items/:_id?").unwrap();
        assert_eq!(pattern.match_path("/items").unwrap(), vec![""]);
        assert_eq!(pattern.match_path("/items/3").unwrap(), vec!["3"]);
    }

    #[test]
    fn test_wildcard_param() {
        let pattern = PathPattern::parse("/files/*path").unwrap();
        let values = pattern.match_path("/files/docs/readme.md").unwrap();
        assert_eq!(values, vec!["docs/readme.md"]);
    }

    #[test]
    fn test_decodes_values() {
        let pattern = PathPattern::parse("/tags/:tag").unwrap();
        assert_eq!(pattern.match_path("/tags/a%20b").unwrap(), vec!["a b"]);
    }

    #[test]
    fn test_empty_param_name_rejected() {
        assert!(matches!(
            PathPattern::parse("/items/:"),
            Err(DispatchError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_reverse() {
        let pattern = PathPattern::parse("/items/:_id").unwrap();
        assert_eq!(pattern.reverse(&params(&[("_id", "5")])).unwrap(), "/items/5");
    }

    #[test]
    fn test_reverse_missing_param() {
        let pattern = PathPattern::parse("/items/:_id").unwrap();
        let err = pattern.reverse(&HashMap::new()).unwrap_err();
        assert!(matches!(err, DispatchError::MissingParameter { ref param, .. } if param == "_id"));
    }

    #[test]
    fn test_reverse_optional_and_wildcard() {
        let pattern = PathPattern::parse("/items/:_id?").unwrap();
        assert_eq!(pattern.reverse(&HashMap::new()).unwrap(), "/items");

        let pattern = PathPattern::parse("/files/*path").unwrap();
        assert_eq!(
            pattern.reverse(&params(&[("path", "a/b c")])).unwrap(),
            "/files/a/b%20c"
        );
    }
}
