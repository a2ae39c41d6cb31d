//! Partition policy: which modules are roots and how orphans are treated.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strata_graph::{GraphError, ModuleGraph, ModuleId};

/// What to do with modules no root can reach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Log, leave out of the output, keep building.
    #[default]
    Exclude,
    /// Fail the build with [`GraphError::Orphans`].
    Error,
}

/// Roots of the partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionPolicy {
    pub entries: BTreeMap<String, ModuleId>,
    pub shared_roots: BTreeSet<ModuleId>,
    /// Boundaries declared up front, in addition to the targets of dynamic edges.
    pub dynamic_boundaries: BTreeSet<ModuleId>,
    pub orphans: OrphanPolicy,
}

impl PartitionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy whose entries are the graph's own entry points.
    pub fn from_graph(graph: &ModuleGraph) -> Self {
        Self {
            entries: graph.entry_points().clone(),
            ..Self::default()
        }
    }

    pub fn entry(mut self, name: impl Into<String>, module: ModuleId) -> Self {
        self.entries.insert(name.into(), module);
        self
    }

    pub fn shared(mut self, module: ModuleId) -> Self {
        self.shared_roots.insert(module);
        self
    }

    pub fn dynamic_boundary(mut self, module: ModuleId) -> Self {
        self.dynamic_boundaries.insert(module);
        self
    }

    pub fn orphans(mut self, policy: OrphanPolicy) -> Self {
        self.orphans = policy;
        self
    }

    /// Check every root against the graph.
    ///
    /// # Errors
    ///
    /// - [`GraphError::NoEntries`] when there are no entries
    /// - [`GraphError::MissingEntry`] for an entry module not in the graph
    /// - [`GraphError::DuplicateEntryModule`] when two entries share a module
    /// - [`GraphError::MissingSharedRoot`] / [`GraphError::MissingBoundary`]
    pub fn validate(&self, graph: &ModuleGraph) -> Result<(), GraphError> {
        if self.entries.is_empty() {
            return Err(GraphError::NoEntries);
        }

        let mut seen: BTreeMap<&ModuleId, &str> = BTreeMap::new();
        for (name, module) in &self.entries {
            if !graph.contains(module) {
                return Err(GraphError::MissingEntry {
                    entry: name.clone(),
                    module: module.clone(),
                });
            }
            if let Some(first) = seen.insert(module, name) {
                return Err(GraphError::DuplicateEntryModule {
                    first: first.to_string(),
                    second: name.clone(),
                    module: module.clone(),
                });
            }
        }

        if let Some(missing) = self.shared_roots.iter().find(|m| !graph.contains(m)) {
            return Err(GraphError::MissingSharedRoot(missing.clone()));
        }
        if let Some(missing) = self.dynamic_boundaries.iter().find(|m| !graph.contains(m)) {
            return Err(GraphError::MissingBoundary(missing.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_graph::Module;

    fn id(s: &str) -> ModuleId {
        ModuleId::new(s).unwrap()
    }

    fn graph() -> ModuleGraph {
        ModuleGraph::builder()
            .module(Module::builder(id("a.js"), "").build())
            .module(Module::builder(id("b.js"), "").build())
            .entry("a", id("a.js"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_from_graph_takes_entries() {
        let policy = PartitionPolicy::from_graph(&graph());
        assert_eq!(policy.entries.get("a"), Some(&id("a.js")));
        assert_eq!(policy.orphans, OrphanPolicy::Exclude);
    }

    #[test]
    fn test_validate_rejects_missing_roots() {
        let graph = graph();
        assert!(matches!(
            PartitionPolicy::new().validate(&graph),
            Err(GraphError::NoEntries)
        ));
        assert!(matches!(
            PartitionPolicy::new().entry("x", id("x.js")).validate(&graph),
            Err(GraphError::MissingEntry { .. })
        ));
        assert!(matches!(
            PartitionPolicy::from_graph(&graph)
                .shared(id("react.js"))
                .validate(&graph),
            Err(GraphError::MissingSharedRoot(_))
        ));
        assert!(matches!(
            PartitionPolicy::from_graph(&graph)
                .dynamic_boundary(id("lazy.js"))
                .validate(&graph),
            Err(GraphError::MissingBoundary(_))
        ));
    }

    #[test]
    fn test_validate_rejects_entry_aliases() {
        let graph = graph();
        let err = PartitionPolicy::new()
            .entry("one", id("a.js"))
            .entry("two", id("a.js"))
            .validate(&graph)
            .unwrap_err();
        match err {
            GraphError::DuplicateEntryModule { first, second, .. } => {
                assert_eq!(first, "one");
                assert_eq!(second, "two");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
