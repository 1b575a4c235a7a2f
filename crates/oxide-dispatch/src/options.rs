//! Option bags shared by the router, routes, controller classes and controllers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::controller::RouteController;
use crate::hooks;

/// Well-known option keys.
pub mod keys {
    /// Data for the controller, a value or a function.
    pub const DATA: &str = "data";
    /// Template rendered on the client when nothing handles a URL.
    pub const NOT_FOUND_TEMPLATE: &str = "notFoundTemplate";
    /// Whether the client router inserts its layout on start.
    pub const AUTO_RENDER: &str = "autoRender";
    /// Template used by the client layout.
    pub const LAYOUT_TEMPLATE: &str = "layoutTemplate";
    /// Controller class name for a route.
    pub const CONTROLLER: &str = "controller";
    /// Environment that handles a route: `client`, `server` or `both`.
    pub const WHERE: &str = "where";
}

/// A data function, invoked with the controller as receiver.
pub type DataFn = Arc<dyn Fn(&RouteController) -> Value + Send + Sync>;

/// A hook function, invoked with the controller as receiver.
pub type Hook = Arc<dyn Fn(&mut RouteController) + Send + Sync>;

/// A hook value: either a function or the name of a registered hook.
#[derive(Clone)]
pub enum HookRef {
    /// Looked up in the router's hook table.
    Named(String),
    /// Called directly.
    Func(Hook),
}

impl HookRef {
    /// Wraps a closure.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&mut RouteController) + Send + Sync + 'static,
    {
        Self::Func(Arc::new(f))
    }
}

impl fmt::Debug for HookRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl From<&str> for HookRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

/// A single option value.
#[derive(Clone)]
pub enum OptionValue {
    /// A plain value.
    Value(Value),
    /// A data function.
    Data(DataFn),
    /// One or more hooks.
    Hooks(Vec<HookRef>),
}

impl OptionValue {
    /// Returns the plain value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Expands this value into hook references.
    ///
    /// Plain strings and arrays of strings name registered hooks; any other
    /// plain value contributes nothing.
    pub fn hook_refs(&self) -> Vec<HookRef> {
        match self {
            Self::Hooks(hooks) => hooks.clone(),
            Self::Value(Value::String(name)) => vec![HookRef::Named(name.clone())],
            Self::Value(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(HookRef::from)
                .collect(),
            Self::Value(_) | Self::Data(_) => Vec::new(),
        }
    }
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Data(_) => f.write_str("Data(..)"),
            Self::Hooks(h) => f.debug_tuple("Hooks").field(h).finish(),
        }
    }
}

/// A bag of named options.
#[derive(Clone, Default)]
pub struct Options {
    entries: HashMap<String, OptionValue>,
}

impl Options {
    /// Creates an empty option bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from a JSON object.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Sets a plain value.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, OptionValue::Value(value.into()));
        self
    }

    /// Sets the data function.
    #[must_use]
    pub fn data<F>(mut self, f: F) -> Self
    where
        F: Fn(&RouteController) -> Value + Send + Sync + 'static,
    {
        self.insert(keys::DATA, OptionValue::Data(Arc::new(f)));
        self
    }

    /// Appends a hook function under `name`.
    #[must_use]
    pub fn hook<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut RouteController) + Send + Sync + 'static,
    {
        self.push_hook(name, HookRef::func(f));
        self
    }

    /// Appends a reference to a registered hook under `name`.
    #[must_use]
    pub fn hook_named(mut self, name: impl Into<String>, hook: &str) -> Self {
        self.push_hook(name, HookRef::from(hook));
        self
    }

    /// Inserts a value, replacing any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: OptionValue) {
        self.entries.insert(key.into(), value);
    }

    /// Appends a hook, turning the entry into a hook list if needed.
    pub fn push_hook(&mut self, name: impl Into<String>, hook: HookRef) {
        let entry = self
            .entries
            .entry(name.into())
            .or_insert_with(|| OptionValue::Hooks(Vec::new()));
        match entry {
            OptionValue::Hooks(hooks) => hooks.push(hook),
            other => {
                let mut hooks = other.hook_refs();
                hooks.push(hook);
                *other = OptionValue::Hooks(hooks);
            }
        }
    }

    /// Gets an entry.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    /// Returns true if the key is defined.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Gets a plain value.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(OptionValue::as_value)
    }

    /// Gets a string value.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(Value::as_str)
    }

    /// Gets a boolean value.
    pub fn bool(&self, key: &str) -> Option<bool> {
        self.value(key).and_then(Value::as_bool)
    }

    /// Returns the hook references stored under `name`.
    pub fn hooks(&self, name: &str) -> Vec<HookRef> {
        self.get(name).map(OptionValue::hook_refs).unwrap_or_default()
    }

    /// Returns true when no option is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

fn is_hook_key(key: &str) -> bool {
    [hooks::RUN, hooks::RERUN, hooks::BEFORE, hooks::AFTER, hooks::STOP]
        .iter()
        .any(|names| names.contains(&key))
}

/// Hook entries must name registered hooks: a string or an array of strings.
fn check_hook_entry(key: &str, value: &Value) -> Result<(), String> {
    let valid = match value {
        Value::String(_) => true,
        Value::Array(items) => items.iter().all(Value::is_string),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(format!(
            "hook option {key:?} must be a hook name or a list of hook names, got {value}"
        ))
    }
}

impl<'de> Deserialize<'de> for Options {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = HashMap::<String, Value>::deserialize(deserializer)?;
        let mut entries = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            if is_hook_key(&key) {
                check_hook_entry(&key, &value).map_err(D::Error::custom)?;
            }
            entries.insert(key, OptionValue::Value(value));
        }
        Ok(Self { entries })
    }
}

/// A dynamically scoped "current options" slot.
///
/// Callers push a bag around a dispatch and pop it afterwards; the most
/// recently pushed bag wins. The router never reads this directly: the top
/// value travels down the dispatch in [`DispatchContext`](crate::DispatchContext).
#[derive(Debug, Default)]
pub struct CurrentOptions {
    stack: Vec<Arc<Options>>,
}

impl CurrentOptions {
    /// Creates an empty scope stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new innermost scope.
    pub fn push(&mut self, options: Options) {
        self.stack.push(Arc::new(options));
    }

    /// Pops the innermost scope.
    pub fn pop(&mut self) -> Option<Arc<Options>> {
        self.stack.pop()
    }

    /// Returns the innermost scope.
    pub fn get(&self) -> Option<Arc<Options>> {
        self.stack.last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_getters() {
        let opts = Options::new()
            .set(keys::NOT_FOUND_TEMPLATE, "missing")
            .set(keys::AUTO_RENDER, false);
        assert_eq!(opts.str(keys::NOT_FOUND_TEMPLATE), Some("missing"));
        assert_eq!(opts.bool(keys::AUTO_RENDER), Some(false));
        assert!(opts.value("other").is_none());
    }

    #[test]
    fn test_from_json() {
        let opts = Options::from_json_str(
            r#"{"layoutTemplate": "main", "before": ["auth", "log"], "data": {"a": 1}}"#,
        )
        .unwrap();
        assert_eq!(opts.str(keys::LAYOUT_TEMPLATE), Some("main"));
        assert_eq!(opts.value(keys::DATA), Some(&json!({"a": 1})));
        let names: Vec<_> = opts
            .hooks("before")
            .into_iter()
            .map(|h| match h {
                HookRef::Named(n) => n,
                HookRef::Func(_) => String::new(),
            })
            .collect();
        assert_eq!(names, vec!["auth", "log"]);
    }

    #[test]
    fn test_from_json_rejects_bad_hook_names() {
        let err = Options::from_json_str(r#"{"before": ["auth", 5]}"#).unwrap_err();
        assert!(err.to_string().contains("\"before\""));
        assert!(Options::from_json_str(r#"{"onStop": {"name": "x"}}"#).is_err());
        // non-hook keys may hold anything
        assert!(Options::from_json_str(r#"{"data": [1, 2]}"#).is_ok());
    }

    #[test]
    fn test_push_hook_appends() {
        let opts = Options::new()
            .set("before", "auth")
            .hook("before", |_| {})
            .hook_named("before", "log");
        assert_eq!(opts.hooks("before").len(), 3);
    }

    #[test]
    fn test_current_options_innermost_wins() {
        let mut current = CurrentOptions::new();
        assert!(current.get().is_none());
        current.push(Options::new().set("a", 1));
        current.push(Options::new().set("a", 2));
        assert_eq!(current.get().unwrap().value("a"), Some(&json!(2)));
        current.pop();
        assert_eq!(current.get().unwrap().value("a"), Some(&json!(1)));
    }
}
