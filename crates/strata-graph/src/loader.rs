//! Graph file loading.
//!
//! The resolver collaborator describes the module graph as JSON: module ids,
//! their edges, and where to find their content. Content is re-read from
//! disk on every load so a build always sees the current sources.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Dependency, DependencyKind, GraphError, Module, ModuleGraph, ModuleId};

/// Default graph file name looked up in the project root.
pub const DEFAULT_GRAPH_FILE: &str = "strata-graph.json";

/// On-disk graph description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphFile {
    /// Entry name to module id.
    #[serde(default)]
    pub entries: BTreeMap<String, String>,
    #[serde(default)]
    pub modules: Vec<ModuleRecord>,
}

/// One module in a graph file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleRecord {
    pub id: String,
    /// File holding the content, relative to the project root. Defaults to the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Inline content; takes precedence over `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<EdgeRecord>,
}

/// An edge is either a bare target (static) or `{ target, kind }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeRecord {
    Target(String),
    Edge {
        target: String,
        #[serde(default)]
        kind: DependencyKind,
    },
}

impl EdgeRecord {
    fn parts(&self) -> (&str, DependencyKind) {
        match self {
            EdgeRecord::Target(target) => (target, DependencyKind::Static),
            EdgeRecord::Edge { target, kind } => (target, *kind),
        }
    }
}

impl GraphFile {
    /// Parse a graph description from JSON text.
    pub fn from_json(text: &str, origin: &Path) -> Result<Self, GraphError> {
        serde_json::from_str(text).map_err(|source| GraphError::GraphFileParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Read module contents relative to `root` and build the graph.
    pub fn into_graph(self, root: &Path) -> Result<ModuleGraph, GraphError> {
        let mut builder = ModuleGraph::builder();

        for record in self.modules {
            let id = parse_id(&record.id)?;

            let content = match (&record.source, &record.path) {
                (Some(source), _) => source.clone().into_bytes(),
                (None, _) if id.is_virtual() => Vec::new(),
                (None, path) => {
                    let path = root.join(path.as_deref().unwrap_or_else(|| Path::new(id.as_str())));
                    std::fs::read(&path).map_err(|source| GraphError::ModuleRead {
                        module: id.clone(),
                        path,
                        source,
                    })?
                }
            };

            let mut module = Module::builder(id, content);
            for edge in &record.dependencies {
                let (target, kind) = edge.parts();
                module = module.edge(Dependency::new(parse_id(target)?, kind));
            }
            builder = builder.module(module.build());
        }

        for (name, module) in self.entries {
            builder = builder.entry(name, parse_id(&module)?);
        }

        builder.build()
    }
}

fn parse_id(raw: &str) -> Result<ModuleId, GraphError> {
    ModuleId::new(raw).map_err(|source| GraphError::InvalidModuleId {
        raw: raw.to_string(),
        source,
    })
}

/// Load a graph file and the module contents it references.
///
/// Relative module paths are resolved against `root`.
///
/// # Errors
///
/// Returns [`GraphError`] when the file cannot be read or parsed, a module id
/// is malformed, a module's content cannot be read, or the graph fails
/// validation.
pub fn load_graph_file(path: &Path, root: &Path) -> Result<ModuleGraph, GraphError> {
    let text = std::fs::read_to_string(path).map_err(|source| GraphError::GraphFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let file = GraphFile::from_json(&text, path)?;
    let graph = file.into_graph(root)?;

    tracing::debug!(
        path = %path.display(),
        modules = graph.len(),
        bytes = graph.total_size(),
        "loaded graph file"
    );

    Ok(graph)
}
