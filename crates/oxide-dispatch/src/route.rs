//! Route definitions.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::error::Result;
use crate::options::{keys, OptionValue, Options};
use crate::params::{Params, UrlParts};
use crate::path::PathPattern;

/// The environment a route or middleware step runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Where {
    /// Browser-side navigation.
    #[default]
    Client,
    /// Server-side HTTP handling.
    Server,
    /// Both environments.
    Both,
}

impl Where {
    /// Parses an environment name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "client" => Some(Self::Client),
            "server" => Some(Self::Server),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    /// Returns true if this eligibility covers `env`.
    ///
    /// `env` is the environment currently dispatching and is never `Both`.
    pub fn includes(self, env: Self) -> bool {
        self == Self::Both || self == env
    }

    /// Returns the name as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for Where {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra parts appended when generating a path.
#[derive(Debug, Clone, Default)]
pub struct PathOptions {
    /// Query string pairs, in insertion order.
    pub query: Vec<(String, String)>,
    /// Fragment without the leading `#`.
    pub hash: Option<String>,
}

impl PathOptions {
    /// Creates empty path options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets the fragment.
    #[must_use]
    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub(crate) fn apply(&self, mut path: String) -> String {
        if !self.query.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            path.push('?');
            path.push_str(&query);
        }
        if let Some(hash) = &self.hash {
            path.push('#');
            path.push_str(hash);
        }
        path
    }
}

/// A registered route.
///
/// Routes are immutable once added to a [`Router`](crate::Router) and are
/// compared by identity when deciding whether a controller can be reused.
#[derive(Debug, Clone)]
pub struct Route {
    /// Optional route name for reverse URL lookup.
    name: Option<String>,
    /// Path pattern.
    pattern: PathPattern,
    /// Route-level options.
    options: Options,
    /// Environment that handles this route.
    where_: Where,
}

impl Route {
    /// Creates a new route for `pattern`.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            name: None,
            pattern: PathPattern::parse(pattern)?,
            options: Options::new(),
            where_: Where::default(),
        })
    }

    /// Sets the route name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the route options.
    ///
    /// A `where` entry in the bag sets the environment.
    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        if let Some(where_) = options.str(keys::WHERE).and_then(Where::parse) {
            self.where_ = where_;
        }
        self.options = options;
        self
    }

    /// Sets the environment that handles this route.
    #[must_use]
    pub fn where_(mut self, where_: Where) -> Self {
        self.where_ = where_;
        self
    }

    /// Sets the controller class used for this route.
    #[must_use]
    pub fn controller(mut self, class: impl Into<String>) -> Self {
        self.options.insert(
            keys::CONTROLLER,
            OptionValue::Value(serde_json::Value::String(class.into())),
        );
        self
    }

    /// Returns the route name.
    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the route options.
    pub fn get_options(&self) -> &Options {
        &self.options
    }

    /// Returns the environment that handles this route.
    pub fn get_where(&self) -> Where {
        self.where_
    }

    /// Returns the path pattern.
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Returns true if the URL's path matches this route.
    pub fn matches(&self, url: &str) -> bool {
        UrlParts::parse(url).is_ok_and(|parts| self.pattern.is_match(&parts.path))
    }

    /// Extracts parameters from `url`.
    ///
    /// Path values are empty when the URL does not match this route; query
    /// and hash are always filled in.
    pub fn params(&self, url: &str) -> Result<Params> {
        let parts = UrlParts::parse(url)?;
        let mut params = Params::new();
        if let Some(values) = self.pattern.match_path(&parts.path) {
            for (name, value) in self.pattern.param_names().iter().zip(values) {
                params.push(name.clone(), value);
            }
        }
        params.query = parts.query;
        params.hash = parts.hash;
        Ok(params)
    }

    /// Generates a path, failing when a required parameter is missing.
    pub fn path(&self, params: &HashMap<String, String>, options: &PathOptions) -> Result<String> {
        Ok(options.apply(self.pattern.reverse(params)?))
    }
}
