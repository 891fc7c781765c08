//! Prerequisites of every element

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechDependency {
    pub requirement: String,
    pub level: i64,
}

/// Element -> list of prerequisites. An element with no prerequisite has an
/// empty entry; an element without entry is unknown to the tree.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    deps: HashMap<String, Vec<TechDependency>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `element` with no prerequisite, keeping existing ones.
    pub fn register(&mut self, element: &str) {
        self.deps.entry(element.to_string()).or_default();
    }

    pub fn add_dependency(&mut self, element: &str, requirement: &str, level: i64) {
        self.deps
            .entry(element.to_string())
            .or_default()
            .push(TechDependency {
                requirement: requirement.to_string(),
                level,
            });
    }

    pub fn dependencies_of(&self, element: &str) -> Option<&[TechDependency]> {
        self.deps.get(element).map(Vec::as_slice)
    }

    /// Whether every prerequisite of `element` is met. `level_of` yields the
    /// level of a building or technology, `None` when nowhere to be found.
    /// Returns `None` when the tree has no entry for `element`.
    pub fn is_satisfied<F>(&self, element: &str, level_of: F) -> Option<bool>
    where
        F: Fn(&str) -> Option<i64>,
    {
        let deps = self.deps.get(element)?;
        Some(deps.iter().all(|dep| match level_of(&dep.requirement) {
            Some(level) => level >= dep.level,
            None => false,
        }))
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }
}
