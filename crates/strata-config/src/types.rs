use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strata_bundler::{BuildMode, OrphanPolicy};

use crate::defaults::*;

/// Contents of `strata.toml` after every layer has been merged.
///
/// Relative paths are resolved against the project root, the directory
/// holding `strata.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    pub mode: BuildMode,

    /// Graph file written by the resolver.
    pub graph: PathBuf,

    pub out_dir: PathBuf,

    /// Also publish development builds to `out_dir`.
    pub write: bool,

    /// Identity characters in production file names.
    pub hash_length: usize,

    /// Entry name to module id. Empty means the graph file's own entries.
    pub entries: BTreeMap<String, String>,

    /// Shared roots; their closure becomes `shared:vendor`.
    pub shared: Vec<String>,

    /// Dynamic boundaries in addition to the targets of dynamic edges.
    pub dynamic: Vec<String>,

    pub orphans: OrphanPolicy,

    /// Worker threads. Unset uses one per core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    pub cache: CacheSection,

    pub manifest: ManifestSection,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            mode: BuildMode::default(),
            graph: default_graph(),
            out_dir: default_out_dir(),
            write: false,
            hash_length: default_hash_length(),
            entries: BTreeMap::new(),
            shared: Vec::new(),
            dynamic: Vec::new(),
            orphans: OrphanPolicy::default(),
            jobs: None,
            cache: CacheSection::default(),
            manifest: ManifestSection::default(),
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Persist the cache to `dir`. Disabled keeps it in memory only.
    pub enabled: bool,
    pub dir: PathBuf,
    /// Bound on in-memory records, least recently used evicted first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
    /// Ignore every cached record for this build.
    pub force_rebuild: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            dir: default_cache_dir(),
            max_entries: None,
            force_rebuild: false,
        }
    }
}

/// `[manifest]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestSection {
    pub file_name: String,
    /// Free-form values copied into the manifest.
    pub metadata: BTreeMap<String, String>,
}

impl Default for ManifestSection {
    fn default() -> Self {
        Self {
            file_name: default_manifest_file(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Values set on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<BuildMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
    #[serde(skip_serializing_if = "CacheOverrides::is_empty")]
    pub cache: CacheOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_rebuild: Option<bool>,
}

impl CacheOverrides {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.dir.is_none() && self.force_rebuild.is_none()
    }
}
