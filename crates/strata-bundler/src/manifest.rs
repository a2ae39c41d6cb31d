//! Run-time bootstrap manifest.
//!
//! The manifest tells a host page which files to load: the runtime first,
//! then for an entry point every chunk it needs, dependencies before
//! dependents. It is emitted after every chunk and nothing it contains
//! feeds back into a chunk identity, so `metadata` or a changed entry list
//! never invalidates cached chunks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::build::BuildMode;
use crate::chunk::ChunkRole;
use crate::hash::ChunkIdentity;
use crate::partition::Partition;
use crate::{Error, Result};

/// Manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Default manifest file name.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One chunk as the loader sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestChunk {
    pub file: String,
    pub kind: ChunkRole,
    pub name: String,
    pub modules: Vec<String>,
    /// References of the chunks this one statically depends on.
    pub imports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub mode: BuildMode,
    /// Reference of the runtime chunk, loaded before anything else.
    pub runtime: String,
    /// Entry point name to the references it needs, in load order.
    pub entries: BTreeMap<String, Vec<String>>,
    /// Dynamic boundary module to the references it needs, in load order.
    pub dynamic: BTreeMap<String, Vec<String>>,
    /// Reference to chunk record.
    pub chunks: BTreeMap<String, ManifestChunk>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Manifest {
    /// Files to load for `entry`, runtime first.
    pub fn files_for_entry(&self, entry: &str) -> Option<Vec<&str>> {
        let refs = self.entries.get(entry)?;
        let mut files = Vec::with_capacity(refs.len() + 1);
        if let Some(runtime) = self.chunks.get(&self.runtime) {
            files.push(runtime.file.as_str());
        }
        files.extend(
            refs.iter()
                .filter_map(|reference| self.chunks.get(reference))
                .map(|chunk| chunk.file.as_str()),
        );
        Some(files)
    }

    /// JSON encoding; pretty printed in development.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let encoded = match self.mode {
            BuildMode::Development => serde_json::to_vec_pretty(self),
            BuildMode::Production => serde_json::to_vec(self),
        };
        encoded.map_err(|err| Error::Serialization {
            chunk: MANIFEST_FILE.to_string(),
            message: err.to_string(),
        })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|err| Error::Serialization {
            chunk: MANIFEST_FILE.to_string(),
            message: err.to_string(),
        })
    }
}

/// Builds a [`Manifest`] from a partition and its identities.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    mode: BuildMode,
    hash_length: usize,
    metadata: BTreeMap<String, String>,
}

impl ManifestBuilder {
    pub fn new(mode: BuildMode, hash_length: usize) -> Self {
        Self {
            mode,
            hash_length,
            metadata: BTreeMap::new(),
        }
    }

    pub fn metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    fn reference(&self, identity: &ChunkIdentity) -> String {
        identity.reference(self.mode, self.hash_length)
    }

    /// `identities` is indexed by [`ChunkId`](crate::ChunkId).
    pub fn build(
        &self,
        partition: &Partition,
        identities: &[ChunkIdentity],
        runtime: &ChunkIdentity,
    ) -> Manifest {
        let refs: Vec<String> = identities.iter().map(|id| self.reference(id)).collect();
        let runtime_ref = self.reference(runtime);

        let mut chunks = BTreeMap::new();
        chunks.insert(
            runtime_ref.clone(),
            ManifestChunk {
                file: ChunkRole::Runtime.file_name(&runtime_ref),
                kind: ChunkRole::Runtime,
                name: "runtime".to_string(),
                modules: Vec::new(),
                imports: Vec::new(),
            },
        );

        for id in partition.ids() {
            let chunk = partition.chunk(id);
            let reference = &refs[id.index()];
            chunks.insert(
                reference.clone(),
                ManifestChunk {
                    file: chunk.role().file_name(reference),
                    kind: chunk.role(),
                    name: chunk.name().to_string(),
                    modules: chunk.modules().iter().map(|m| m.as_str().to_string()).collect(),
                    imports: chunk
                        .dependencies()
                        .iter()
                        .map(|dep| refs[dep.index()].clone())
                        .collect(),
                },
            );
        }

        let load_refs = |root| {
            partition
                .load_order(root)
                .into_iter()
                .map(|id| refs[id.index()].clone())
                .collect::<Vec<_>>()
        };

        let entries = partition
            .entries()
            .iter()
            .map(|(name, &chunk)| (name.clone(), load_refs(chunk)))
            .collect();

        let dynamic = partition
            .boundaries()
            .iter()
            .map(|(module, &chunk)| (module.as_str().to_string(), load_refs(chunk)))
            .collect();

        Manifest {
            version: MANIFEST_VERSION,
            mode: self.mode,
            runtime: runtime_ref,
            entries,
            dynamic,
            chunks,
            metadata: self.metadata.clone(),
        }
    }
}
