//! Chunk data model.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_graph::ModuleId;

use crate::hash::ChunkIdentity;

/// Index of a chunk inside a [`Partition`](crate::partition::Partition).
///
/// Chunks are stored sorted by name, so comparing ids compares names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub(crate) usize);

impl ChunkId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A partition root: a named entry point or a dynamic boundary module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Root {
    Entry(String),
    Boundary(ModuleId),
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Root::Entry(name) => f.write_str(name),
            Root::Boundary(id) => write!(f, "import({id})"),
        }
    }
}

/// Which roots a shared chunk serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedGroup {
    /// Closure of the configured shared roots.
    Vendor,
    /// Modules reached by exactly this set of roots, at least one of them an entry.
    Roots(Vec<Root>),
}

/// What a chunk is for. Every consumer matches on this exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChunkKind {
    /// Initial chunk of one entry point; executes `module` once loaded.
    Entry { name: String, module: ModuleId },
    /// Loaded up front, reused across roots.
    Shared { group: SharedGroup },
    /// Lazily loaded. One boundary for a per-boundary chunk, several for a
    /// chunk shared by exactly that set of boundaries.
    Dynamic { boundaries: Vec<ModuleId> },
}

impl ChunkKind {
    pub fn role(&self) -> ChunkRole {
        match self {
            ChunkKind::Entry { .. } => ChunkRole::Entry,
            ChunkKind::Shared { .. } => ChunkRole::Shared,
            ChunkKind::Dynamic { .. } => ChunkRole::Dynamic,
        }
    }

    /// Module executed after the chunk loads, for entry chunks.
    pub fn bootstrap(&self) -> Option<&ModuleId> {
        match self {
            ChunkKind::Entry { module, .. } => Some(module),
            ChunkKind::Shared { .. } | ChunkKind::Dynamic { .. } => None,
        }
    }

    /// Human readable chunk name; unique within a partition.
    pub(crate) fn display_name(&self) -> String {
        match self {
            ChunkKind::Entry { name, .. } => format!("entry:{name}"),
            ChunkKind::Shared {
                group: SharedGroup::Vendor,
            } => "shared:vendor".to_string(),
            ChunkKind::Shared {
                group: SharedGroup::Roots(roots),
            } => format!("shared:{}", join(roots)),
            ChunkKind::Dynamic { boundaries } => format!("dynamic:{}", join(boundaries)),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("+")
}

/// Output role of an artifact; the first half of every chunk file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkRole {
    Runtime,
    Entry,
    Shared,
    Dynamic,
}

impl ChunkRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkRole::Runtime => "runtime",
            ChunkRole::Entry => "entry",
            ChunkRole::Shared => "shared",
            ChunkRole::Dynamic => "dynamic",
        }
    }

    /// Deterministic file name for a chunk with this role and identity reference.
    pub fn file_name(self, reference: &str) -> String {
        format!("{}-{reference}.js", self.as_str())
    }
}

impl fmt::Display for ChunkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named output unit owning an ordered, deduplicated set of modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub(crate) name: String,
    pub(crate) kind: ChunkKind,
    pub(crate) modules: Vec<ModuleId>,
    pub(crate) dependencies: Vec<ChunkId>,
}

impl Chunk {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ChunkKind {
        &self.kind
    }

    pub fn role(&self) -> ChunkRole {
        self.kind.role()
    }

    /// Modules in serialization order (dependencies first, lexical ties).
    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }

    /// Chunks this chunk statically depends on, in name order.
    pub fn dependencies(&self) -> &[ChunkId] {
        &self.dependencies
    }

    pub fn contains(&self, module: &ModuleId) -> bool {
        self.modules.contains(module)
    }
}

/// A finished chunk as it appears in a build result.
#[derive(Debug, Clone)]
pub struct ChunkOutput {
    pub chunk: Chunk,
    pub identity: ChunkIdentity,
    pub file_name: String,
    /// Served from the incremental cache instead of being recomputed.
    pub cached: bool,
}
