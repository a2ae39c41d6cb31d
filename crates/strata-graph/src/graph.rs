//! Owned, ordered module graph.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::{GraphError, Module, ModuleId};

/// Immutable module graph handed to the bundler by the resolver.
///
/// Modules and entry points are kept in `BTreeMap`s so every iteration is
/// in lexical id order. Nothing downstream depends on insertion order.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: BTreeMap<ModuleId, Module>,
    entries: BTreeMap<String, ModuleId>,
}

impl ModuleGraph {
    pub fn builder() -> ModuleGraphBuilder {
        ModuleGraphBuilder::default()
    }

    /// All modules, in id order.
    pub fn modules(&self) -> impl ExactSizeIterator<Item = &Module> {
        self.modules.values()
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    /// Named entry points declared alongside the graph.
    pub fn entry_points(&self) -> &BTreeMap<String, ModuleId> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Total content size in bytes.
    pub fn total_size(&self) -> usize {
        self.modules.values().map(Module::size).sum()
    }

    /// Modules reachable from `roots` over static edges, roots included.
    ///
    /// Modules for which `stop` returns `true` are neither included nor
    /// traversed. Unknown ids are skipped; the builder already rejected
    /// dangling edges.
    pub fn static_closure<'a, I, F>(&self, roots: I, stop: F) -> BTreeSet<ModuleId>
    where
        I: IntoIterator<Item = &'a ModuleId>,
        F: Fn(&ModuleId) -> bool,
    {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&ModuleId> = VecDeque::new();

        for root in roots {
            if !stop(root) && self.contains(root) && seen.insert(root.clone()) {
                queue.push_back(root);
            }
        }

        while let Some(current) = queue.pop_front() {
            let Some(module) = self.modules.get(current) else {
                continue;
            };
            for target in module.static_dependencies() {
                if stop(target) || !self.contains(target) {
                    continue;
                }
                if seen.insert(target.clone()) {
                    queue.push_back(target);
                }
            }
        }

        seen
    }
}

/// Collects modules and entry points, then validates them into a [`ModuleGraph`].
#[derive(Debug, Default)]
pub struct ModuleGraphBuilder {
    modules: Vec<Module>,
    entries: Vec<(String, ModuleId)>,
}

impl ModuleGraphBuilder {
    pub fn module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    pub fn modules<I>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = Module>,
    {
        self.modules.extend(modules);
        self
    }

    pub fn entry(mut self, name: impl Into<String>, module: ModuleId) -> Self {
        self.entries.push((name.into(), module));
        self
    }

    /// Validate and freeze the graph.
    ///
    /// # Errors
    ///
    /// - [`GraphError::DuplicateModule`] when an id is supplied twice
    /// - [`GraphError::UnresolvedDependency`] when an edge targets an unknown module
    /// - [`GraphError::MissingEntry`] when a declared entry is not in the graph
    pub fn build(self) -> Result<ModuleGraph, GraphError> {
        let mut modules = BTreeMap::new();
        for module in self.modules {
            let id = module.id().clone();
            if modules.insert(id.clone(), module).is_some() {
                return Err(GraphError::DuplicateModule(id));
            }
        }

        for module in modules.values() {
            for dep in module.dependencies() {
                if !modules.contains_key(&dep.target) {
                    return Err(GraphError::UnresolvedDependency {
                        from: module.id().clone(),
                        to: dep.target.clone(),
                    });
                }
            }
        }

        let mut entries = BTreeMap::new();
        for (name, module) in self.entries {
            if !modules.contains_key(&module) {
                return Err(GraphError::MissingEntry {
                    entry: name,
                    module,
                });
            }
            entries.insert(name, module);
        }

        tracing::debug!(
            modules = modules.len(),
            entries = entries.len(),
            "module graph built"
        );

        Ok(ModuleGraph { modules, entries })
    }
}
