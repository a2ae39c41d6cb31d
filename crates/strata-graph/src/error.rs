use std::path::PathBuf;

use thiserror::Error;

use super::{ModuleId, ModuleIdError};

/// Fatal problems with the module graph or the partition policy applied to it.
///
/// Any of these aborts the build before anything is published.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Entry point names a module that is not in the graph.
    #[error("entry point '{entry}' is unreachable: module '{module}' is not in the graph")]
    MissingEntry { entry: String, module: ModuleId },

    /// Shared root is not in the graph.
    #[error("shared root '{0}' is not in the graph")]
    MissingSharedRoot(ModuleId),

    /// Declared dynamic boundary is not in the graph.
    #[error("dynamic boundary '{0}' is not in the graph")]
    MissingBoundary(ModuleId),

    /// An edge points at a module the resolver never supplied.
    #[error("module '{from}' depends on '{to}', which is not in the graph")]
    UnresolvedDependency { from: ModuleId, to: ModuleId },

    /// The same module id was supplied twice.
    #[error("module '{0}' appears more than once in the graph")]
    DuplicateModule(ModuleId),

    /// No entry points were given.
    #[error("no entry points were declared")]
    NoEntries,

    /// Two entry names point at the same module.
    #[error("entry points '{first}' and '{second}' both start at module '{module}'")]
    DuplicateEntryModule {
        first: String,
        second: String,
        module: ModuleId,
    },

    /// Partitioning produced chunks that depend on each other in a cycle.
    #[error("chunks depend on each other in a cycle: {}", .chunks.join(" -> "))]
    ChunkCycle { chunks: Vec<String> },

    /// Orphan modules under the strict orphan policy.
    #[error("{} module(s) are unreachable from any root: {}", .modules.len(), join_ids(.modules))]
    Orphans { modules: Vec<ModuleId> },

    /// Module id in the graph file is malformed.
    #[error("invalid module id '{raw}': {source}")]
    InvalidModuleId {
        raw: String,
        #[source]
        source: ModuleIdError,
    },

    /// Module content could not be read.
    #[error("failed to read module '{module}' from {}: {source}", .path.display())]
    ModuleRead {
        module: ModuleId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Graph file could not be read.
    #[error("failed to read graph file {}: {source}", .path.display())]
    GraphFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Graph file is not valid JSON for the expected shape.
    #[error("invalid graph file {}: {source}", .path.display())]
    GraphFileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn join_ids(ids: &[ModuleId]) -> String {
    ids.iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl GraphError {
    /// Module this error points at, if any.
    pub fn module(&self) -> Option<&ModuleId> {
        match self {
            GraphError::MissingEntry { module, .. }
            | GraphError::DuplicateEntryModule { module, .. } => Some(module),
            GraphError::MissingSharedRoot(module)
            | GraphError::MissingBoundary(module)
            | GraphError::DuplicateModule(module) => Some(module),
            GraphError::UnresolvedDependency { from, .. } => Some(from),
            GraphError::ModuleRead { module, .. } => Some(module),
            GraphError::Orphans { modules } => modules.first(),
            GraphError::NoEntries
            | GraphError::ChunkCycle { .. }
            | GraphError::InvalidModuleId { .. }
            | GraphError::GraphFileRead { .. }
            | GraphError::GraphFileParse { .. } => None,
        }
    }
}
