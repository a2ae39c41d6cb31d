//! # strata-bundler
//!
//! Incremental chunking, content hashing and atomic emission on top of the
//! `strata-graph` module graph.
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_bundler::{BuildContext, BuildOptions, PartitionPolicy};
//! use strata_graph::{Module, ModuleGraph, ModuleId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let a = ModuleId::new("src/a.js")?;
//! let b = ModuleId::new("src/b.js")?;
//! let shared = ModuleId::new("src/shared.js")?;
//!
//! let graph = ModuleGraph::builder()
//!     .module(Module::builder(a.clone(), "require('./shared.js');").dependency(shared.clone()).build())
//!     .module(Module::builder(b.clone(), "require('./shared.js');").dependency(shared.clone()).build())
//!     .module(Module::builder(shared, "module.exports = 1;").build())
//!     .entry("a", a)
//!     .entry("b", b)
//!     .build()?;
//!
//! let policy = PartitionPolicy::from_graph(&graph);
//! let result = BuildContext::new(graph, policy, BuildOptions::development()).build()?;
//!
//! // entry:a, entry:b and the chunk they share.
//! assert_eq!(result.chunks().len(), 3);
//! assert_eq!(result.manifest().entries["a"].len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Incremental rebuilds
//!
//! Give successive builds the same [`IncrementalCache`] and unchanged chunks
//! are served from it: same bytes, same identity, same file name. Editing a
//! module only changes the identity of its own chunk and of the chunks that
//! depend on it.

pub mod build;
pub mod cache;
pub mod chunk;
pub mod emit;
pub mod hash;
pub mod manifest;
pub mod output;
pub mod partition;
pub mod policy;

mod order;

pub use build::{
    BuildContext, BuildMode, BuildOptions, BuildResult, BuildStats, CancellationToken,
    DEFAULT_HASH_LENGTH, build,
};
pub use cache::{
    CacheConfig, CacheCorruptionError, CacheError, CacheKey, CacheStats, CachedChunk,
    IncrementalCache,
};
pub use chunk::{Chunk, ChunkId, ChunkKind, ChunkOutput, ChunkRole, Root, SharedGroup};
pub use emit::ChunkSerializer;
pub use hash::{ChunkIdentity, ContentHasher};
pub use manifest::{Manifest, ManifestBuilder, ManifestChunk};
pub use output::Artifact;
pub use partition::{OrphanModuleError, Partition, partition};
pub use policy::{OrphanPolicy, PartitionPolicy};

pub use strata_graph::{GraphError, Module, ModuleGraph, ModuleId};

/// Error types for strata-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The graph or the policy applied to it is unusable.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A chunk or the manifest could not be serialized.
    #[error("failed to serialize '{chunk}': {message}")]
    Serialization { chunk: String, message: String },

    /// File write operation failed.
    #[error("Write failure: {0}")]
    WriteFailure(String),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    /// Two artifacts claim the same file name or reference.
    #[error("'{first}' and '{second}' both claim {file}")]
    ArtifactCollision {
        file: String,
        first: String,
        second: String,
        hash_length: usize,
    },

    /// The build was cancelled; nothing was published.
    #[error("build cancelled")]
    Cancelled,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache maintenance failed. Builds never fail with this.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Result type alias for strata-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Graph(GraphError::ChunkCycle { .. }) => "strata::graph::chunk_cycle",
            Error::Graph(GraphError::Orphans { .. }) => "strata::graph::orphans",
            Error::Graph(_) => "strata::graph",
            Error::Serialization { .. } => "strata::serialization",
            Error::WriteFailure(_) => "strata::write_failure",
            Error::InvalidOutputPath(_) => "strata::invalid_output_path",
            Error::ArtifactCollision { .. } => "strata::artifact_collision",
            Error::Cancelled => "strata::cancelled",
            Error::InvalidConfig(_) => "strata::invalid_config",
            Error::Io(_) => "strata::io",
            Error::Cache(_) => "strata::cache",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Graph(GraphError::ChunkCycle { .. }) => Some(Box::new(
                "Shared roots must not import application modules. Remove the module from `shared` or break the import.",
            )),
            Error::Graph(GraphError::Orphans { .. }) => Some(Box::new(
                "Declare an entry or dynamic boundary that reaches these modules, remove them from the graph, or set `orphans = \"exclude\"`.",
            )),
            Error::Graph(GraphError::DuplicateEntryModule { .. }) => Some(Box::new(
                "Each entry point needs its own module. Remove one of the entries.",
            )),
            Error::Graph(err) => err
                .module()
                .map(|module| Box::new(format!("Check module '{module}' in the graph file.")) as Box<dyn std::fmt::Display>),
            Error::ArtifactCollision { hash_length, .. } => Some(Box::new(format!(
                "Two identities share the first {hash_length} characters. Increase `hash_length`."
            ))),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Ensure it's within the output directory and doesn't contain '..' components.",
                path
            ))),
            Error::WriteFailure(msg) => Some(Box::new(format!(
                "Failed to write file. Check disk space and permissions.\nError: {}",
                msg
            ))),
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check strata.toml and the command line flags.\nError: {}",
                msg
            ))),
            Error::Cache(_) => Some(Box::new(
                "Run `strata cache clear` to start from an empty cache.",
            )),
            Error::Serialization { .. } | Error::Cancelled | Error::Io(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic;

    #[test]
    fn test_codes_are_namespaced() {
        let err = Error::Graph(GraphError::NoEntries);
        assert_eq!(err.code().unwrap().to_string(), "strata::graph");
        assert_eq!(Error::Cancelled.code().unwrap().to_string(), "strata::cancelled");
    }

    #[test]
    fn test_collision_help_mentions_hash_length() {
        let err = Error::ArtifactCollision {
            file: "entry-abcd.js".into(),
            first: "entry:a".into(),
            second: "entry:b".into(),
            hash_length: 4,
        };
        let help = err.help().unwrap().to_string();
        assert!(help.contains("hash_length"));
        assert!(err.to_string().contains("entry-abcd.js"));
    }

    #[test]
    fn test_graph_help_names_module() {
        let err = Error::from(GraphError::MissingSharedRoot(ModuleId::new("lib/react.js").unwrap()));
        assert!(err.help().unwrap().to_string().contains("lib/react.js"));
    }
}
