//! Controller classes.
//!
//! A class is a named set of static definitions (values, data functions,
//! hooks) with an optional parent. Its lineage is flattened once, when the
//! class is declared, so lookups and hook collection never walk parents at
//! dispatch time.

use std::sync::Arc;

use crate::options::{HookRef, OptionValue, Options};

/// Name of the class every controller falls back to.
pub const BASE_CLASS: &str = "RouteController";

/// A declared controller type.
#[derive(Debug)]
pub struct ControllerClass {
    name: String,
    /// Static definitions of every class in the hierarchy, base first.
    lineage: Vec<Arc<Options>>,
}

impl ControllerClass {
    /// Declares the root class.
    pub fn base() -> Arc<Self> {
        Arc::new(Self {
            name: BASE_CLASS.to_string(),
            lineage: vec![Arc::new(Options::new())],
        })
    }

    /// Declares a subclass of `parent` with its own static definitions.
    pub fn extend(parent: &Arc<Self>, name: impl Into<String>, statics: Options) -> Arc<Self> {
        let mut lineage = parent.lineage.clone();
        lineage.push(Arc::new(statics));
        Arc::new(Self {
            name: name.into(),
            lineage,
        })
    }

    /// Returns the class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a static definition, most specific class first.
    pub fn lookup(&self, key: &str) -> Option<&OptionValue> {
        self.lineage.iter().rev().find_map(|statics| statics.get(key))
    }

    /// Collects hooks declared under `name`, base class first.
    pub fn hooks(&self, name: &str) -> Vec<HookRef> {
        self.lineage
            .iter()
            .flat_map(|statics| statics.hooks(name))
            .collect()
    }

    /// Number of classes in the hierarchy, including this one.
    pub fn depth(&self) -> usize {
        self.lineage.len()
    }
}
