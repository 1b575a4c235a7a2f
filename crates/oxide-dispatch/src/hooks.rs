//! Router-wide hooks and the named-hook table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::controller::RouteController;
use crate::error::{DispatchError, Result};
use crate::options::{Hook, HookRef};

/// Hook names run on the first dispatch of a controller.
pub const RUN: &[&str] = &["onRun", "run"];
/// Hook names run when an existing controller is dispatched again.
pub const RERUN: &[&str] = &["onRerun", "rerun"];
/// Hook names run before the middleware stack.
pub const BEFORE: &[&str] = &["onBeforeAction", "before"];
/// Hook names run after a successful middleware walk.
pub const AFTER: &[&str] = &["onAfterAction", "after"];
/// Hook names run when a controller is stopped.
pub const STOP: &[&str] = &["onStop", "stop"];

/// Restricts a router-wide hook to some routes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HookFilter {
    /// Applies to every route.
    #[default]
    All,
    /// Applies only to the named routes.
    Only(Vec<String>),
    /// Applies to every route except the named ones.
    Except(Vec<String>),
}

impl HookFilter {
    /// Creates an `Only` filter.
    pub fn only(names: &[&str]) -> Self {
        Self::Only(names.iter().map(|s| (*s).to_string()).collect())
    }

    /// Creates an `Except` filter.
    pub fn except(names: &[&str]) -> Self {
        Self::Except(names.iter().map(|s| (*s).to_string()).collect())
    }

    /// Checks the filter against the current route's name.
    fn applies_to(&self, route_name: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => route_name.is_some_and(|n| names.iter().any(|x| x == n)),
            Self::Except(names) => !route_name.is_some_and(|n| names.iter().any(|x| x == n)),
        }
    }
}

#[derive(Debug, Clone)]
struct GlobalHook {
    hook: HookRef,
    filter: HookFilter,
}

/// Hooks owned by the router.
#[derive(Default, Clone)]
pub struct HookRegistry {
    /// Hooks addressable by name from option values.
    named: HashMap<String, Hook>,
    /// Router-wide hooks keyed by hook name, in registration order.
    global: HashMap<String, Vec<GlobalHook>>,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook that options can refer to by `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut RouteController) + Send + Sync + 'static,
    {
        self.named.insert(name.into(), Arc::new(f));
    }

    /// Adds a router-wide hook under `hook_name`.
    pub fn add(&mut self, hook_name: impl Into<String>, hook: HookRef, filter: HookFilter) {
        self.global
            .entry(hook_name.into())
            .or_default()
            .push(GlobalHook { hook, filter });
    }

    /// Returns the router-wide hooks for `hook_name` that apply to `route_name`.
    pub fn get_hooks(&self, hook_name: &str, route_name: Option<&str>) -> Vec<HookRef> {
        self.global
            .get(hook_name)
            .map(|hooks| {
                hooks
                    .iter()
                    .filter(|h| h.filter.applies_to(route_name))
                    .map(|h| h.hook.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resolves a hook reference to a callable hook.
    pub fn lookup(&self, hook: &HookRef) -> Result<Hook> {
        match hook {
            HookRef::Func(f) => Ok(Arc::clone(f)),
            HookRef::Named(name) => self
                .named
                .get(name)
                .cloned()
                .ok_or_else(|| DispatchError::HookNotFound(name.clone())),
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .field("global", &self.global)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters() {
        let mut registry = HookRegistry::new();
        registry.add("before", HookRef::from("all"), HookFilter::All);
        registry.add("before", HookRef::from("admin"), HookFilter::only(&["admin"]));
        registry.add("before", HookRef::from("public"), HookFilter::except(&["admin"]));

        assert_eq!(registry.get_hooks("before", Some("admin")).len(), 2);
        assert_eq!(registry.get_hooks("before", Some("home")).len(), 2);
        assert_eq!(registry.get_hooks("before", None).len(), 2);
        assert!(registry.get_hooks("after", Some("home")).is_empty());
    }

    #[test]
    fn test_lookup_named() {
        let mut registry = HookRegistry::new();
        registry.register("noop", |_| {});
        assert!(registry.lookup(&HookRef::from("noop")).is_ok());
        assert!(matches!(
            registry.lookup(&HookRef::from("missing")),
            Err(DispatchError::HookNotFound(name)) if name == "missing"
        ));
    }
}
