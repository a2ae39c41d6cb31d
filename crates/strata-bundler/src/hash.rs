//! Chunk identities.
//!
//! A chunk identity is a blake3 digest over:
//! 1. A domain tag
//! 2. The chunk kind tag (and, for entry chunks, the bootstrap module id)
//! 3. The content digests of its modules, in serialization order
//! 4. The identities of the chunks it statically depends on, sorted
//!
//! Chunk names are not hashed, so renaming an entry point keeps its
//! identity. Dependency identities already fold in their own dependencies,
//! which makes the identity transitive.

use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use strata_graph::ModuleGraph;

use crate::build::BuildMode;
use crate::chunk::{Chunk, ChunkKind, ChunkRole};

const CHUNK_DOMAIN: &[u8] = b"strata-chunk-v1\0";
const RUNTIME_DOMAIN: &[u8] = b"strata-runtime-v1\0";

/// Content-derived identity of a chunk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkIdentity([u8; 32]);

impl ChunkIdentity {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full 64 character lowercase hex.
    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }

    /// Display string used in file names and the manifest.
    ///
    /// Development uses the full hex digest; production the first
    /// `hash_length` characters. The length is taken as given:
    /// [`BuildOptions::validate`](crate::BuildOptions::validate) is what
    /// rejects values outside [`HASH_LENGTH_RANGE`](crate::build::HASH_LENGTH_RANGE).
    pub fn reference(&self, mode: BuildMode, hash_length: usize) -> String {
        let mut hex = self.to_hex();
        if mode == BuildMode::Production {
            hex.truncate(hash_length);
        }
        hex
    }
}

impl fmt::Debug for ChunkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkIdentity({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ChunkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub(crate) fn kind_tag(kind: &ChunkKind) -> u8 {
    match kind {
        ChunkKind::Entry { .. } => b'e',
        ChunkKind::Shared { .. } => b's',
        ChunkKind::Dynamic { .. } => b'd',
    }
}

/// Computes chunk identities against one module graph.
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher<'g> {
    graph: &'g ModuleGraph,
}

impl<'g> ContentHasher<'g> {
    pub fn new(graph: &'g ModuleGraph) -> Self {
        Self { graph }
    }

    /// Identity of `chunk` given the identities of the chunks it depends on.
    ///
    /// `dependencies` may be in any order; they are sorted before hashing.
    pub fn identity(&self, chunk: &Chunk, dependencies: &[ChunkIdentity]) -> ChunkIdentity {
        let mut hasher = Hasher::new();
        hasher.update(CHUNK_DOMAIN);
        hasher.update(&[kind_tag(chunk.kind())]);

        if let Some(bootstrap) = chunk.kind().bootstrap() {
            hasher.update(bootstrap.as_str().as_bytes());
            hasher.update(&[0]);
        }

        hasher.update(&(chunk.modules().len() as u64).to_le_bytes());
        for id in chunk.modules() {
            if let Some(module) = self.graph.module(id) {
                hasher.update(module.digest().as_bytes());
            }
        }

        let mut sorted = dependencies.to_vec();
        sorted.sort();
        sorted.dedup();
        hasher.update(&(sorted.len() as u64).to_le_bytes());
        for dependency in &sorted {
            hasher.update(dependency.as_bytes());
        }

        ChunkIdentity(*hasher.finalize().as_bytes())
    }
}

/// Identity of the runtime chunk; changes only when the runtime source does.
pub fn runtime_identity(source: &str) -> ChunkIdentity {
    let mut hasher = Hasher::new();
    hasher.update(RUNTIME_DOMAIN);
    hasher.update(ChunkRole::Runtime.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(source.as_bytes());
    ChunkIdentity(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuildOptions;
    use crate::partition::partition;
    use crate::policy::PartitionPolicy;
    use strata_graph::{Module, ModuleId};

    fn id(s: &str) -> ModuleId {
        ModuleId::new(s).unwrap()
    }

    fn graph(a_source: &str) -> ModuleGraph {
        ModuleGraph::builder()
            .module(Module::builder(id("a.js"), a_source).dependency(id("c.js")).build())
            .module(Module::builder(id("b.js"), "b").dependency(id("c.js")).build())
            .module(Module::builder(id("c.js"), "c").build())
            .entry("a", id("a.js"))
            .entry("b", id("b.js"))
            .build()
            .unwrap()
    }

    fn identities(graph: &ModuleGraph) -> Vec<(String, ChunkIdentity)> {
        let partition = partition(graph, &PartitionPolicy::from_graph(graph)).unwrap();
        let hasher = ContentHasher::new(graph);
        let mut done: Vec<Option<ChunkIdentity>> = vec![None; partition.chunks().len()];
        for level in partition.levels() {
            for &chunk_id in level {
                let chunk = partition.chunk(chunk_id);
                let deps: Vec<ChunkIdentity> = chunk
                    .dependencies()
                    .iter()
                    .filter_map(|d| done[d.index()])
                    .collect();
                done[chunk_id.index()] = Some(hasher.identity(chunk, &deps));
            }
        }
        partition
            .chunks()
            .iter()
            .zip(done)
            .map(|(chunk, identity)| (chunk.name().to_string(), identity.unwrap()))
            .collect()
    }

    #[test]
    fn test_identity_is_deterministic() {
        assert_eq!(identities(&graph("a")), identities(&graph("a")));
    }

    #[test]
    fn test_edit_changes_only_the_owning_chunk() {
        let before = identities(&graph("a"));
        let after = identities(&graph("a edited"));

        for ((name, old), (_, new)) in before.iter().zip(&after) {
            if name == "entry:a" {
                assert_ne!(old, new, "{name} should change");
            } else {
                assert_eq!(old, new, "{name} should be stable");
            }
        }
    }

    #[test]
    fn test_dependency_identities_are_order_independent() {
        let graph = graph("a");
        let partition = partition(&graph, &PartitionPolicy::from_graph(&graph)).unwrap();
        let chunk = &partition.chunks()[0];
        let hasher = ContentHasher::new(&graph);
        let x = ChunkIdentity::from_bytes([1; 32]);
        let y = ChunkIdentity::from_bytes([2; 32]);
        assert_eq!(hasher.identity(chunk, &[x, y]), hasher.identity(chunk, &[y, x]));
        assert_ne!(hasher.identity(chunk, &[x]), hasher.identity(chunk, &[y]));
    }

    #[test]
    fn test_reference_by_mode() {
        let identity = ChunkIdentity::from_bytes([0xab; 32]);
        assert_eq!(identity.reference(BuildMode::Development, 8).len(), 64);
        assert_eq!(identity.reference(BuildMode::Production, 8), "abababab");
        assert_eq!(identity.reference(BuildMode::Production, 4), "abab");
        assert_eq!(identity.reference(BuildMode::Production, 64), identity.to_hex());
    }

    #[test]
    fn test_reference_length_is_not_adjusted() {
        let identity = ChunkIdentity::from_bytes([0xcd; 32]);
        assert_eq!(identity.reference(BuildMode::Production, 2), "cd");
        assert!(BuildOptions::development().hash_length(2).validate().is_err());
    }

    #[test]
    fn test_runtime_identity_tracks_source() {
        assert_eq!(runtime_identity("x"), runtime_identity("x"));
        assert_ne!(runtime_identity("x"), runtime_identity("y"));
    }
}
