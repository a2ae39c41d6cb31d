//! Build orchestration.
//!
//! A build is one transaction over an explicit [`BuildContext`]:
//!
//! 1. Partition the module graph
//! 2. Walk chunk dependency levels bottom-up; inside a level every chunk is
//!    handled in parallel: compute its cache key, reuse the cached bytes and
//!    identity on a hit, otherwise hash, serialize and store
//! 3. Add the runtime chunk, assign file names, build the manifest last
//! 4. Publish everything together (production) or keep it in memory
//!    (development)
//!
//! Any fatal error aborts before publication, leaving earlier output as it
//! was. Cache records written by an aborted build stay valid.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strata_graph::ModuleGraph;

use crate::cache::{IncrementalCache, compute_cache_key};
use crate::chunk::{ChunkId, ChunkOutput, ChunkRole};
use crate::emit::{ChunkSerializer, RUNTIME_SOURCE};
use crate::hash::{ChunkIdentity, ContentHasher, runtime_identity};
use crate::manifest::{MANIFEST_FILE, Manifest, ManifestBuilder};
use crate::output::{Artifact, publish};
use crate::partition::{OrphanModuleError, Partition, partition};
use crate::policy::PartitionPolicy;
use crate::{Error, Result};

/// Default number of identity hex characters in production file names.
pub const DEFAULT_HASH_LENGTH: usize = 8;

/// Valid range for `hash_length`.
pub const HASH_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 4..=64;

/// Serialization and emission policy. Partitioning and identities do not
/// depend on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Readable output, full identities, kept in memory.
    #[serde(alias = "dev")]
    Development,
    /// Minified output, short identities, published to disk.
    #[default]
    #[serde(alias = "prod")]
    Production,
}

impl BuildMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }

    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(BuildMode::Development),
            "production" | "prod" => Ok(BuildMode::Production),
            other => Err(Error::InvalidConfig(format!(
                "unknown build mode '{other}' (expected 'development' or 'production')"
            ))),
        }
    }
}

/// Options for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub mode: BuildMode,
    /// Identity characters in production file names.
    pub hash_length: usize,
    /// Output directory. Required in production.
    pub out_dir: Option<PathBuf>,
    /// Also publish development builds to `out_dir`.
    pub write: bool,
    /// Size of a dedicated worker pool. `None` uses the global rayon pool.
    pub jobs: Option<usize>,
    pub manifest_file: String,
    /// Copied into the manifest. Never affects chunk identities.
    pub metadata: BTreeMap<String, String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            mode: BuildMode::default(),
            hash_length: DEFAULT_HASH_LENGTH,
            out_dir: None,
            write: false,
            jobs: None,
            manifest_file: MANIFEST_FILE.to_string(),
            metadata: BTreeMap::new(),
        }
    }
}

impl BuildOptions {
    pub fn development() -> Self {
        Self {
            mode: BuildMode::Development,
            ..Self::default()
        }
    }

    pub fn production(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: BuildMode::Production,
            out_dir: Some(out_dir.into()),
            ..Self::default()
        }
    }

    pub fn mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn hash_length(mut self, hash_length: usize) -> Self {
        self.hash_length = hash_length;
        self
    }

    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn manifest_file(mut self, name: impl Into<String>) -> Self {
        self.manifest_file = name.into();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether this build publishes to disk.
    pub fn publishes(&self) -> bool {
        self.mode.is_production() || self.write
    }

    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for an out-of-range hash length, zero jobs,
    /// an empty manifest name, or a publishing build without `out_dir`.
    pub fn validate(&self) -> Result<()> {
        if !HASH_LENGTH_RANGE.contains(&self.hash_length) {
            return Err(Error::InvalidConfig(format!(
                "hash_length must be between {} and {}, got {}",
                HASH_LENGTH_RANGE.start(),
                HASH_LENGTH_RANGE.end(),
                self.hash_length
            )));
        }
        if self.jobs == Some(0) {
            return Err(Error::InvalidConfig("jobs must be at least 1".to_string()));
        }
        if self.manifest_file.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "manifest file name must not be empty".to_string(),
            ));
        }
        if self.publishes() && self.out_dir.is_none() {
            return Err(Error::InvalidConfig(format!(
                "{} builds that write to disk need an output directory",
                self.mode
            )));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag shared between a build and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Summary numbers for one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Chunks produced, excluding the runtime chunk.
    pub chunks: usize,
    pub modules: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Corrupted cache records that were evicted and recomputed.
    pub cache_corruptions: usize,
    pub orphans: usize,
    /// Bytes across all artifacts, manifest included.
    pub bytes: u64,
    pub duration: Duration,
}

/// Everything one build produced. Immutable once returned.
#[derive(Debug, Clone)]
pub struct BuildResult {
    chunks: Vec<ChunkOutput>,
    runtime: ChunkIdentity,
    manifest: Manifest,
    artifacts: Vec<Artifact>,
    orphans: Vec<OrphanModuleError>,
    stats: BuildStats,
    published_to: Option<PathBuf>,
}

impl BuildResult {
    /// Chunks in name order.
    pub fn chunks(&self) -> &[ChunkOutput] {
        &self.chunks
    }

    pub fn chunk(&self, name: &str) -> Option<&ChunkOutput> {
        self.chunks.iter().find(|c| c.chunk.name() == name)
    }

    pub fn runtime_identity(&self) -> ChunkIdentity {
        self.runtime
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Runtime first, then chunks, manifest last.
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn artifact(&self, file_name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.file_name == file_name)
    }

    pub fn orphans(&self) -> &[OrphanModuleError] {
        &self.orphans
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Directory the build was published to, if it was.
    pub fn published_to(&self) -> Option<&Path> {
        self.published_to.as_deref()
    }

    /// Publish these artifacts to `dir`, replacing its contents atomically.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<()> {
        publish(dir.as_ref(), &self.artifacts)
    }
}

/// Everything a build needs. There is no process-wide state: two contexts
/// can build concurrently, sharing a cache if they are given the same one.
#[derive(Debug, Clone)]
pub struct BuildContext {
    graph: Arc<ModuleGraph>,
    policy: PartitionPolicy,
    options: BuildOptions,
    cache: Arc<IncrementalCache>,
    cancel: CancellationToken,
}

struct Processed {
    identity: ChunkIdentity,
    bytes: Vec<u8>,
    cached: bool,
    corrupted: bool,
}

impl BuildContext {
    /// Context with an in-memory cache and a fresh cancellation token.
    pub fn new(graph: impl Into<Arc<ModuleGraph>>, policy: PartitionPolicy, options: BuildOptions) -> Self {
        Self {
            graph: graph.into(),
            policy,
            options,
            cache: Arc::new(IncrementalCache::in_memory()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<IncrementalCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    pub fn policy(&self) -> &PartitionPolicy {
        &self.policy
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<IncrementalCache> {
        &self.cache
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one build.
    ///
    /// # Errors
    ///
    /// Graph, serialization, configuration and write errors, or
    /// [`Error::Cancelled`]. Nothing is published when an error is returned.
    pub fn build(&self) -> Result<BuildResult> {
        let started = Instant::now();
        self.options.validate()?;
        self.cancel.check()?;
        let _build = self.cache.begin_build();

        let partition = partition(&self.graph, &self.policy)?;
        self.cancel.check()?;

        let processed = match self.options.jobs {
            Some(jobs) => rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .thread_name(|i| format!("strata-worker-{i}"))
                .build()
                .map_err(|e| Error::InvalidConfig(format!("failed to start worker pool: {e}")))?
                .install(|| self.process_levels(&partition))?,
            None => self.process_levels(&partition)?,
        };

        let corruptions = processed.iter().filter(|p| p.corrupted).count();
        let mode = self.options.mode;
        let hash_length = self.options.hash_length;
        let serializer = ChunkSerializer::new(&self.graph, mode);
        let runtime = runtime_identity(RUNTIME_SOURCE);

        let mut names = OutputNames::new(mode, hash_length);
        let runtime_file = names.claim_chunk(ChunkRole::Runtime, &runtime, "runtime")?;
        let mut artifacts = Vec::with_capacity(processed.len() + 2);
        artifacts.push(Artifact::new(runtime_file, serializer.runtime(&runtime)));

        let mut chunks = Vec::with_capacity(processed.len());
        let mut identities = Vec::with_capacity(processed.len());
        for (chunk, done) in partition.chunks().iter().zip(processed.iter()) {
            let file_name = names.claim_chunk(chunk.role(), &done.identity, chunk.name())?;
            identities.push(done.identity);
            chunks.push(ChunkOutput {
                chunk: chunk.clone(),
                identity: done.identity,
                file_name,
                cached: done.cached,
            });
        }

        let manifest = ManifestBuilder::new(mode, hash_length)
            .metadata(self.options.metadata.clone())
            .build(&partition, &identities, &runtime);
        let manifest_file = names.claim_file(self.options.manifest_file.clone(), "manifest")?;

        for (output, done) in chunks.iter().zip(processed) {
            artifacts.push(Artifact::new(output.file_name.clone(), done.bytes));
        }
        artifacts.push(Artifact::new(manifest_file, manifest.to_json()?));

        self.cancel.check()?;

        let published_to = if self.options.publishes() {
            let dir = self
                .options
                .out_dir
                .as_deref()
                .ok_or_else(|| Error::InvalidConfig("no output directory".to_string()))?;
            publish(dir, &artifacts)?;
            Some(dir.to_path_buf())
        } else {
            None
        };

        if let Err(err) = self.cache.flush() {
            tracing::warn!(error = %err, "failed to persist build cache");
        }

        let cache_hits = chunks.iter().filter(|c| c.cached).count();
        let stats = BuildStats {
            chunks: chunks.len(),
            modules: chunks.iter().map(|c| c.chunk.modules().len()).sum(),
            cache_hits,
            cache_misses: chunks.len() - cache_hits,
            cache_corruptions: corruptions,
            orphans: partition.orphans().len(),
            bytes: artifacts.iter().map(|a| a.size() as u64).sum(),
            duration: started.elapsed(),
        };

        tracing::info!(
            mode = %mode,
            chunks = stats.chunks,
            modules = stats.modules,
            cache_hits = stats.cache_hits,
            cache_misses = stats.cache_misses,
            orphans = stats.orphans,
            duration_ms = stats.duration.as_millis() as u64,
            "build finished"
        );

        Ok(BuildResult {
            chunks,
            runtime,
            manifest,
            artifacts,
            orphans: partition.orphans().to_vec(),
            stats,
            published_to,
        })
    }

    /// Process chunks level by level; results are indexed by [`ChunkId`].
    fn process_levels(&self, partition: &Partition) -> Result<Vec<Processed>> {
        let mut done: Vec<Option<Processed>> = Vec::new();
        done.resize_with(partition.chunks().len(), || None);

        for level in partition.levels() {
            let results: Vec<(ChunkId, Processed)> = level
                .par_iter()
                .map(|&id| {
                    self.cancel.check()?;
                    let deps = partition
                        .chunk(id)
                        .dependencies()
                        .iter()
                        .map(|dep| {
                            done[dep.index()].as_ref().map(|p| p.identity).ok_or_else(|| {
                                Error::InvalidConfig(format!(
                                    "chunk '{}' was scheduled before its dependencies",
                                    partition.chunk(id).name()
                                ))
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok((id, self.process_chunk(partition, id, &deps)?))
                })
                .collect::<Result<Vec<_>>>()?;

            for (id, processed) in results {
                done[id.index()] = Some(processed);
            }
        }

        done.into_iter()
            .enumerate()
            .map(|(index, processed)| {
                processed.ok_or_else(|| {
                    Error::InvalidConfig(format!(
                        "chunk '{}' was never scheduled",
                        partition.chunks()[index].name()
                    ))
                })
            })
            .collect()
    }

    fn process_chunk(&self, partition: &Partition, id: ChunkId, deps: &[ChunkIdentity]) -> Result<Processed> {
        let chunk = partition.chunk(id);
        let mode = self.options.mode;
        let key = compute_cache_key(&self.graph, chunk, deps, mode);

        let mut corrupted = false;
        match self.cache.lookup(&key) {
            Ok(Some(hit)) => {
                tracing::debug!(chunk = chunk.name(), identity = %hit.identity, "cache hit");
                return Ok(Processed {
                    identity: hit.identity,
                    bytes: hit.bytes.clone(),
                    cached: true,
                    corrupted,
                });
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(chunk = chunk.name(), "{err}; recomputing");
                corrupted = true;
            }
        }

        let identity = ContentHasher::new(&self.graph).identity(chunk, deps);
        let bytes = ChunkSerializer::new(&self.graph, mode).serialize(chunk, &identity)?;
        let stored = self.cache.store(key, identity, bytes);
        tracing::debug!(chunk = chunk.name(), identity = %stored.identity, "chunk computed");

        Ok(Processed {
            identity: stored.identity,
            bytes: stored.bytes.clone(),
            cached: false,
            corrupted,
        })
    }
}

/// References and file names handed out during one build.
///
/// The manifest keys chunks by reference, so a reference must be unique
/// across every role, runtime included, not only within a role.
struct OutputNames {
    mode: BuildMode,
    hash_length: usize,
    references: BTreeMap<String, String>,
    files: BTreeMap<String, String>,
}

impl OutputNames {
    fn new(mode: BuildMode, hash_length: usize) -> Self {
        Self {
            mode,
            hash_length,
            references: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    /// Claim the reference of `identity` and its file name for `owner`.
    fn claim_chunk(&mut self, role: ChunkRole, identity: &ChunkIdentity, owner: &str) -> Result<String> {
        let reference = identity.reference(self.mode, self.hash_length);
        if let Some(first) = self.references.get(&reference) {
            return Err(Error::ArtifactCollision {
                file: reference,
                first: first.clone(),
                second: owner.to_string(),
                hash_length: self.hash_length,
            });
        }
        let file = self.claim_file(role.file_name(&reference), owner)?;
        self.references.insert(reference, owner.to_string());
        Ok(file)
    }

    fn claim_file(&mut self, file: String, owner: &str) -> Result<String> {
        if let Some(first) = self.files.get(&file) {
            return Err(Error::ArtifactCollision {
                file,
                first: first.clone(),
                second: owner.to_string(),
                hash_length: self.hash_length,
            });
        }
        self.files.insert(file.clone(), owner.to_string());
        Ok(file)
    }
}

/// Build `graph` once with an in-memory cache.
pub fn build(graph: ModuleGraph, policy: PartitionPolicy, options: BuildOptions) -> Result<BuildResult> {
    BuildContext::new(graph, policy, options).build()
}
