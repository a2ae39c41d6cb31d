//! Chunk partitioning.
//!
//! Modules are grouped by the exact set of roots (entry points and dynamic
//! boundaries) whose static closure reaches them:
//!
//! - the static closure of the configured shared roots forms one `vendor`
//!   shared chunk;
//! - a module reached by a single root lives in that root's entry or
//!   dynamic chunk;
//! - a module reached by several roots lives in the chunk keyed by exactly
//!   that root set, a shared chunk when an entry point is among them and a
//!   dynamic chunk when only boundaries are.
//!
//! Every module therefore lands in exactly one chunk. Because importing a
//! module can only widen the set of roots that reach it, chunk dependencies
//! point from narrower to wider root sets and cannot form a cycle; only the
//! vendor chunk can break that, which is checked.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use strata_graph::{GraphError, ModuleGraph, ModuleId};
use thiserror::Error;

use crate::chunk::{Chunk, ChunkId, ChunkKind, Root, SharedGroup};
use crate::order::{find_cycle, levels, stable_topological};
use crate::policy::{OrphanPolicy, PartitionPolicy};

/// A module no declared root reaches. Recoverable: the module is left out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("module '{module}' is unreachable from any entry point, shared root or dynamic boundary")]
pub struct OrphanModuleError {
    pub module: ModuleId,
}

/// Result of partitioning a module graph.
#[derive(Debug, Clone)]
pub struct Partition {
    chunks: Vec<Chunk>,
    module_chunk: FxHashMap<ModuleId, ChunkId>,
    boundaries: BTreeMap<ModuleId, ChunkId>,
    entries: BTreeMap<String, ChunkId>,
    orphans: Vec<OrphanModuleError>,
    levels: Vec<Vec<ChunkId>>,
}

impl Partition {
    /// Chunks sorted by name.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, id: ChunkId) -> &Chunk {
        &self.chunks[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = ChunkId> + '_ {
        (0..self.chunks.len()).map(ChunkId)
    }

    pub fn chunk_of(&self, module: &ModuleId) -> Option<ChunkId> {
        self.module_chunk.get(module).copied()
    }

    /// Entry name to its entry chunk.
    pub fn entries(&self) -> &BTreeMap<String, ChunkId> {
        &self.entries
    }

    /// Dynamic boundary module to the chunk that owns it.
    pub fn boundaries(&self) -> &BTreeMap<ModuleId, ChunkId> {
        &self.boundaries
    }

    pub fn orphans(&self) -> &[OrphanModuleError] {
        &self.orphans
    }

    /// Chunks grouped so that every chunk's dependencies sit in earlier levels.
    pub fn levels(&self) -> &[Vec<ChunkId>] {
        &self.levels
    }

    /// Chunks needed to run `root`, dependencies first, ties by chunk name.
    pub fn load_order(&self, root: ChunkId) -> Vec<ChunkId> {
        let mut closure = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if closure.insert(current) {
                stack.extend(self.chunk(current).dependencies.iter().copied());
            }
        }
        stable_topological(&closure, |id| self.chunk(*id).dependencies.clone()).order
    }
}

/// Partition `graph` into chunks according to `policy`.
///
/// # Errors
///
/// Any [`GraphError`] from policy validation, orphans under
/// [`OrphanPolicy::Error`], or [`GraphError::ChunkCycle`] when the vendor
/// chunk and application chunks import each other.
pub fn partition(graph: &ModuleGraph, policy: &PartitionPolicy) -> Result<Partition, GraphError> {
    policy.validate(graph)?;

    let entry_modules: BTreeSet<&ModuleId> = policy.entries.values().collect();
    let vendor = graph.static_closure(&policy.shared_roots, |m| entry_modules.contains(m));

    // Discover boundaries reachable from the roots we already know about.
    let mut boundaries: BTreeSet<ModuleId> = policy.dynamic_boundaries.clone();
    for module in &vendor {
        if let Some(module) = graph.module(module) {
            boundaries.extend(module.dynamic_dependencies().cloned());
        }
    }

    let mut pending: Vec<Root> = policy
        .entries
        .keys()
        .cloned()
        .map(Root::Entry)
        .chain(boundaries.iter().cloned().map(Root::Boundary))
        .collect();
    let mut closures: BTreeMap<Root, BTreeSet<ModuleId>> = BTreeMap::new();

    while let Some(root) = pending.pop() {
        if closures.contains_key(&root) {
            continue;
        }
        let start = match &root {
            Root::Entry(name) => &policy.entries[name],
            Root::Boundary(module) => module,
        };
        let closure = graph.static_closure([start], |_| false);
        for member in &closure {
            if let Some(module) = graph.module(member) {
                for target in module.dynamic_dependencies() {
                    if boundaries.insert(target.clone()) {
                        pending.push(Root::Boundary(target.clone()));
                    }
                }
            }
        }
        closures.insert(root, closure);
    }

    // Roots reaching each non-vendor module.
    let mut reached_by: BTreeMap<ModuleId, BTreeSet<Root>> = BTreeMap::new();
    for (root, closure) in &closures {
        for module in closure.iter().filter(|m| !vendor.contains(*m)) {
            reached_by
                .entry(module.clone())
                .or_default()
                .insert(root.clone());
        }
    }

    let orphans: Vec<OrphanModuleError> = graph
        .modules()
        .map(|m| m.id())
        .filter(|id| !vendor.contains(*id) && !reached_by.contains_key(*id))
        .map(|id| OrphanModuleError { module: id.clone() })
        .collect();

    if !orphans.is_empty() {
        match policy.orphans {
            OrphanPolicy::Exclude => {
                for orphan in &orphans {
                    tracing::warn!(module = %orphan.module, "{}", orphan);
                }
            }
            OrphanPolicy::Error => {
                return Err(GraphError::Orphans {
                    modules: orphans.into_iter().map(|o| o.module).collect(),
                });
            }
        }
    }

    // Group modules by chunk kind. Entry chunks exist even when empty.
    let mut groups: BTreeMap<ChunkKind, BTreeSet<ModuleId>> = BTreeMap::new();
    for (name, module) in &policy.entries {
        groups.entry(entry_kind(name, module)).or_default();
    }
    if !vendor.is_empty() {
        groups.insert(
            ChunkKind::Shared {
                group: SharedGroup::Vendor,
            },
            vendor.clone(),
        );
    }
    for (module, roots) in reached_by {
        let kind = kind_for_roots(&roots, policy);
        groups.entry(kind).or_default().insert(module);
    }

    let mut named: Vec<(String, ChunkKind, BTreeSet<ModuleId>)> = groups
        .into_iter()
        .map(|(kind, modules)| (kind.display_name(), kind, modules))
        .collect();
    named.sort_by(|a, b| a.0.cmp(&b.0));

    let mut module_chunk: FxHashMap<ModuleId, ChunkId> = FxHashMap::default();
    for (index, (_, _, modules)) in named.iter().enumerate() {
        for module in modules {
            module_chunk.insert(module.clone(), ChunkId(index));
        }
    }

    let mut chunks = Vec::with_capacity(named.len());
    for (index, (name, kind, members)) in named.into_iter().enumerate() {
        let mut dependencies = BTreeSet::new();
        for member in &members {
            let Some(module) = graph.module(member) else {
                continue;
            };
            for target in module.static_dependencies() {
                if let Some(&owner) = module_chunk.get(target) {
                    if owner.0 != index {
                        dependencies.insert(owner);
                    }
                }
            }
        }

        // An entry whose module lives in a shared chunk still has to load it.
        if let Some(owner) = kind.bootstrap().and_then(|m| module_chunk.get(m)) {
            if owner.0 != index {
                dependencies.insert(*owner);
            }
        }

        let modules = stable_topological(&members, |id| {
            graph
                .module(id)
                .map(|m| m.static_dependencies().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
        })
        .order;

        chunks.push(Chunk {
            name,
            kind,
            modules,
            dependencies: dependencies.into_iter().collect(),
        });
    }

    let all: BTreeSet<ChunkId> = (0..chunks.len()).map(ChunkId).collect();
    if let Some(cycle) = find_cycle(&all, |id| chunks[id.0].dependencies.clone()) {
        return Err(GraphError::ChunkCycle {
            chunks: cycle.iter().map(|id| chunks[id.0].name.clone()).collect(),
        });
    }

    let order = stable_topological(&all, |id| chunks[id.0].dependencies.clone()).order;
    let levels = levels(&order, |id| chunks[id.0].dependencies.clone());

    let entries = chunks
        .iter()
        .enumerate()
        .filter_map(|(index, chunk)| match &chunk.kind {
            ChunkKind::Entry { name, .. } => Some((name.clone(), ChunkId(index))),
            ChunkKind::Shared { .. } | ChunkKind::Dynamic { .. } => None,
        })
        .collect();

    let boundaries = boundaries
        .into_iter()
        .filter_map(|boundary| {
            let owner = module_chunk.get(&boundary).copied()?;
            Some((boundary, owner))
        })
        .collect();

    tracing::debug!(
        chunks = chunks.len(),
        orphans = orphans.len(),
        levels = levels.len(),
        "partitioned module graph"
    );

    Ok(Partition {
        chunks,
        module_chunk,
        boundaries,
        entries,
        orphans,
        levels,
    })
}

fn entry_kind(name: &str, module: &ModuleId) -> ChunkKind {
    ChunkKind::Entry {
        name: name.to_string(),
        module: module.clone(),
    }
}

fn kind_for_roots(roots: &BTreeSet<Root>, policy: &PartitionPolicy) -> ChunkKind {
    if roots.len() == 1 {
        if let Some(root) = roots.first() {
            return match root {
                Root::Entry(name) => entry_kind(name, &policy.entries[name]),
                Root::Boundary(module) => ChunkKind::Dynamic {
                    boundaries: vec![module.clone()],
                },
            };
        }
    }

    if roots.iter().any(|root| matches!(root, Root::Entry(_))) {
        ChunkKind::Shared {
            group: SharedGroup::Roots(roots.iter().cloned().collect()),
        }
    } else {
        ChunkKind::Dynamic {
            boundaries: roots
                .iter()
                .filter_map(|root| match root {
                    Root::Boundary(module) => Some(module.clone()),
                    Root::Entry(_) => None,
                })
                .collect(),
        }
    }
}
