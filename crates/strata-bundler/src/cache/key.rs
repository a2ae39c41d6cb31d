//! Cache key computation.
//!
//! The key is a blake3 hash of:
//! 1. Cache format version
//! 2. Sorted module content digests
//! 3. Sorted identities of the chunks depended upon
//! 4. Chunk kind tag and bootstrap module
//! 5. Build mode
//!
//! Chunk names are not part of the key, so a renamed but unchanged chunk
//! still hits. Module digests cover content, id and edges, so a changed
//! module can never map to an old entry.

use std::fmt;

use blake3::Hasher;
use strata_graph::{ModuleDigest, ModuleGraph};

use super::entry::CACHE_FORMAT_VERSION;
use crate::build::BuildMode;
use crate::chunk::Chunk;
use crate::hash::{ChunkIdentity, kind_tag};

/// Content-addressed cache key (blake3 hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the key under which `chunk` is cached.
pub fn compute_cache_key(
    graph: &ModuleGraph,
    chunk: &Chunk,
    dependencies: &[ChunkIdentity],
    mode: BuildMode,
) -> CacheKey {
    let mut hasher = Hasher::new();

    hasher.update(&CACHE_FORMAT_VERSION.to_le_bytes());

    let mut digests: Vec<ModuleDigest> = chunk
        .modules()
        .iter()
        .filter_map(|id| graph.module(id))
        .map(|module| module.digest())
        .collect();
    digests.sort();
    hasher.update(&(digests.len() as u64).to_le_bytes());
    for digest in &digests {
        hasher.update(digest.as_bytes());
    }

    let mut deps = dependencies.to_vec();
    deps.sort();
    deps.dedup();
    hasher.update(&(deps.len() as u64).to_le_bytes());
    for dep in &deps {
        hasher.update(dep.as_bytes());
    }

    hasher.update(&[kind_tag(chunk.kind())]);
    if let Some(bootstrap) = chunk.kind().bootstrap() {
        hasher.update(bootstrap.as_str().as_bytes());
    }
    hasher.update(&[0]);

    hasher.update(mode.as_str().as_bytes());

    CacheKey(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition;
    use crate::policy::PartitionPolicy;
    use strata_graph::{Module, ModuleId};

    fn id(s: &str) -> ModuleId {
        ModuleId::new(s).unwrap()
    }

    fn graph(entry_name: &str, content: &str) -> ModuleGraph {
        ModuleGraph::builder()
            .module(Module::builder(id("main.js"), content).build())
            .entry(entry_name, id("main.js"))
            .build()
            .unwrap()
    }

    fn key(graph: &ModuleGraph, mode: BuildMode) -> CacheKey {
        let partition = partition(graph, &PartitionPolicy::from_graph(graph)).unwrap();
        compute_cache_key(graph, &partition.chunks()[0], &[], mode)
    }

    #[test]
    fn test_key_ignores_chunk_name() {
        assert_eq!(
            key(&graph("main", "x"), BuildMode::Production),
            key(&graph("renamed", "x"), BuildMode::Production)
        );
    }

    #[test]
    fn test_key_tracks_content_and_mode() {
        let base = key(&graph("main", "x"), BuildMode::Production);
        assert_ne!(base, key(&graph("main", "y"), BuildMode::Production));
        assert_ne!(base, key(&graph("main", "x"), BuildMode::Development));
        assert_eq!(base.as_hex().len(), 64);
    }

    #[test]
    fn test_key_tracks_dependency_identities() {
        let graph = graph("main", "x");
        let partition = partition(&graph, &PartitionPolicy::from_graph(&graph)).unwrap();
        let chunk = &partition.chunks()[0];
        let a = compute_cache_key(&graph, chunk, &[ChunkIdentity::from_bytes([1; 32])], BuildMode::Production);
        let b = compute_cache_key(&graph, chunk, &[ChunkIdentity::from_bytes([2; 32])], BuildMode::Production);
        assert_ne!(a, b);
    }
}
