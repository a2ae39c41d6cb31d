//! # strata-graph
//!
//! The module graph contract consumed by the strata bundler.
//!
//! A resolver collaborator parses application sources and resolves imports;
//! this crate only holds the result: modules with their raw content, their
//! ordered static and dynamic dependency edges, and the named entry points.
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_graph::{Module, ModuleGraph, ModuleId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let app = ModuleId::new("src/app.js")?;
//! let util = ModuleId::new("src/util.js")?;
//!
//! let graph = ModuleGraph::builder()
//!     .module(Module::builder(app.clone(), "import './util.js';").dependency(util.clone()).build())
//!     .module(Module::builder(util, "export const x = 1;").build())
//!     .entry("main", app)
//!     .build()?;
//!
//! assert_eq!(graph.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Determinism
//!
//! Module ids are project-relative and normalized, graph iteration is in id
//! order, and every module carries a blake3 digest over its id, content and
//! edges. Nothing here depends on timestamps, file-system ordering or memory
//! addresses.

mod error;
mod graph;
mod loader;
mod module;
mod module_id;

pub use error::GraphError;
pub use graph::{ModuleGraph, ModuleGraphBuilder};
pub use loader::{DEFAULT_GRAPH_FILE, EdgeRecord, GraphFile, ModuleRecord, load_graph_file};
pub use module::{Dependency, DependencyKind, Module, ModuleBuilder, ModuleDigest};
pub use module_id::{ModuleId, ModuleIdError};

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
