//! Incremental chunk cache.
//!
//! Two layers:
//!
//! - **Memory**: a sharded `DashMap` from [`CacheKey`] to the cached record.
//!   Lookups never take a global lock; concurrent stores of the same key are
//!   coalesced through the entry API so only one record is kept. An optional
//!   `max_entries` bound evicts the least recently used records.
//! - **Persistent** (optional): a redb database in the configured directory.
//!   Memory misses fall through to disk and are promoted. New records are
//!   written in one transaction by [`IncrementalCache::flush`].
//!
//! Keys are content addressed, so a changed module can never be served an
//! old record. Records also carry a checksum; one that fails verification
//! is evicted from both layers and reported as [`CacheCorruptionError`] so
//! the caller can recompute.
//!
//! If the database cannot be opened the cache keeps working in memory only.
//!
//! Each flush records the keys in use so `prune` can drop the rest. Builds
//! that overlap in time share one key set: it is only reset when a build
//! starts while no other build holds the cache.

mod entry;
mod key;
mod store;

pub use entry::{CACHE_FORMAT_VERSION, CacheCorruptionError, CachedChunk};
pub use key::{CacheKey, compute_cache_key};
pub use store::{CacheError, CacheStore, DATABASE_FILE};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde::Serialize;

use crate::hash::ChunkIdentity;

/// Environment variable that forces every lookup to miss.
pub const FORCE_REBUILD_ENV: &str = "STRATA_FORCE_REBUILD";

/// Configuration for the incremental cache.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Directory of the persistent database (`<dir>/cache.redb`). `None`
    /// keeps the cache in memory only.
    pub dir: Option<PathBuf>,

    /// Upper bound on in-memory records. `None` is unbounded.
    pub max_entries: Option<usize>,

    /// Bypass reads but keep writing. Useful for CI or refreshing the cache.
    pub force_rebuild: bool,
}

impl CacheConfig {
    /// In-memory cache with no persistent layer.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Cache persisted under `dir`.
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }

    /// Check if force rebuild is requested here or via `STRATA_FORCE_REBUILD`.
    pub fn should_force_rebuild(&self) -> bool {
        self.force_rebuild || std::env::var_os(FORCE_REBUILD_ENV).is_some()
    }
}

/// Counters and sizes reported by [`IncrementalCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Records currently held in memory.
    pub entries: usize,
    /// Records in the persistent layer, when there is one.
    pub persisted: Option<usize>,
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub evictions: u64,
    pub corruptions: u64,
}

#[derive(Debug)]
struct Slot {
    chunk: Arc<CachedChunk>,
    last_access: AtomicU64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    evictions: AtomicU64,
    corruptions: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Content-addressed cache of serialized chunks and their identities.
#[derive(Debug)]
pub struct IncrementalCache {
    config: CacheConfig,
    force_rebuild: bool,
    memory: DashMap<CacheKey, Slot>,
    store: Option<CacheStore>,
    /// Records stored since the last flush.
    dirty: DashMap<CacheKey, Arc<CachedChunk>>,
    /// Keys read or written by the builds in flight, or by the last one.
    live: DashSet<CacheKey>,
    /// Number of builds between `begin_build` and the end of their guard.
    builds: Mutex<usize>,
    tick: AtomicU64,
    counters: Counters,
    flush_lock: Mutex<()>,
}

impl IncrementalCache {
    /// Memory-only cache.
    pub fn in_memory() -> Self {
        Self::open(CacheConfig::memory())
    }

    /// Open a cache. Never fails: a persistent layer that cannot be opened
    /// is logged and skipped.
    pub fn open(config: CacheConfig) -> Self {
        let store = config.dir.as_deref().and_then(|dir| match CacheStore::open(dir) {
            Ok(store) => {
                tracing::debug!(path = %store.path().display(), "opened persistent cache");
                Some(store)
            }
            Err(err) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %err,
                    "persistent cache unavailable, continuing in memory only"
                );
                None
            }
        });

        Self {
            force_rebuild: config.should_force_rebuild(),
            config,
            memory: DashMap::new(),
            store,
            dirty: DashMap::new(),
            live: DashSet::new(),
            builds: Mutex::new(0),
            tick: AtomicU64::new(0),
            counters: Counters::default(),
            flush_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether the persistent layer is in use.
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Start tracking the keys of a new build. Keep the guard until the
    /// build has flushed.
    pub fn begin_build(&self) -> BuildGuard<'_> {
        let mut builds = self.builds.lock();
        if *builds == 0 {
            self.live.clear();
        }
        *builds += 1;
        BuildGuard { cache: self }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    /// Look up a record.
    ///
    /// # Errors
    ///
    /// [`CacheCorruptionError`] when the record fails verification. It has
    /// already been evicted from both layers when this returns.
    pub fn lookup(&self, key: &CacheKey) -> Result<Option<Arc<CachedChunk>>, CacheCorruptionError> {
        if self.force_rebuild {
            bump(&self.counters.misses);
            return Ok(None);
        }

        let in_memory = self.memory.get(key).map(|slot| {
            slot.last_access.store(self.next_tick(), Ordering::Relaxed);
            Arc::clone(&slot.chunk)
        });
        if let Some(chunk) = in_memory {
            return self.accept(key, chunk).map(Some);
        }

        let Some(store) = &self.store else {
            bump(&self.counters.misses);
            return Ok(None);
        };

        match store.get(key) {
            Ok(Some(chunk)) => {
                let chunk = self.accept(key, Arc::new(chunk))?;
                self.memory.entry(key.clone()).or_insert_with(|| Slot {
                    chunk: Arc::clone(&chunk),
                    last_access: AtomicU64::new(self.next_tick()),
                });
                self.enforce_limit();
                Ok(Some(chunk))
            }
            Ok(None) => {
                bump(&self.counters.misses);
                Ok(None)
            }
            Err(CacheError::Deserialization { message, .. }) => {
                let err = CacheCorruptionError {
                    key: key.clone(),
                    reason: message,
                };
                self.evict(key);
                bump(&self.counters.corruptions);
                Err(err)
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "persistent cache read failed");
                bump(&self.counters.misses);
                Ok(None)
            }
        }
    }

    fn accept(&self, key: &CacheKey, chunk: Arc<CachedChunk>) -> Result<Arc<CachedChunk>, CacheCorruptionError> {
        if let Err(err) = chunk.verify(key) {
            self.evict(key);
            bump(&self.counters.corruptions);
            return Err(err);
        }
        bump(&self.counters.hits);
        self.live.insert(key.clone());
        Ok(chunk)
    }

    /// Store a record. If another thread stored the same key first, its
    /// record is kept and returned.
    pub fn store(&self, key: CacheKey, identity: ChunkIdentity, bytes: Vec<u8>) -> Arc<CachedChunk> {
        self.live.insert(key.clone());

        let chunk = match self.memory.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                let slot = occupied.get();
                slot.last_access.store(self.next_tick(), Ordering::Relaxed);
                Arc::clone(&slot.chunk)
            }
            Entry::Vacant(vacant) => {
                let chunk = Arc::new(CachedChunk::new(&key, identity, bytes));
                vacant.insert(Slot {
                    chunk: Arc::clone(&chunk),
                    last_access: AtomicU64::new(self.next_tick()),
                });
                if self.store.is_some() {
                    self.dirty.insert(key, Arc::clone(&chunk));
                }
                bump(&self.counters.stores);
                chunk
            }
        };

        self.enforce_limit();
        chunk
    }

    /// Drop the least recently used records above `max_entries`.
    fn enforce_limit(&self) {
        let Some(max) = self.config.max_entries else {
            return;
        };
        let len = self.memory.len();
        if len <= max {
            return;
        }

        let mut by_age: Vec<(u64, CacheKey)> = self
            .memory
            .iter()
            .map(|slot| (slot.last_access.load(Ordering::Relaxed), slot.key().clone()))
            .collect();
        by_age.sort();

        for (_, key) in by_age.into_iter().take(len - max) {
            if self.memory.remove(&key).is_some() {
                bump(&self.counters.evictions);
                tracing::trace!(key = %key, "evicted least recently used cache entry");
            }
        }
    }

    /// Remove a record from every layer.
    pub fn evict(&self, key: &CacheKey) {
        self.memory.remove(key);
        self.dirty.remove(key);
        if let Some(store) = &self.store {
            if let Err(err) = store.remove(key) {
                tracing::warn!(key = %key, error = %err, "failed to evict persistent cache entry");
            }
        }
    }

    /// Write records stored since the last flush, and the current build's key
    /// set, to the persistent layer. Returns the number of records written.
    pub fn flush(&self) -> Result<usize, CacheError> {
        let _guard = self.flush_lock.lock();
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let pending: Vec<(CacheKey, Arc<CachedChunk>)> = self
            .dirty
            .iter()
            .map(|item| (item.key().clone(), Arc::clone(item.value())))
            .collect();
        let live: BTreeSet<CacheKey> = self.live.iter().map(|key| key.key().clone()).collect();

        store.commit(
            pending.iter().map(|(key, chunk)| (key, chunk.as_ref())),
            Some(&live),
        )?;

        for (key, chunk) in &pending {
            self.dirty
                .remove_if(key, |_, current| Arc::ptr_eq(current, chunk));
        }

        tracing::debug!(written = pending.len(), live = live.len(), "flushed cache");
        Ok(pending.len())
    }

    /// Remove every record from memory and disk.
    pub fn clear(&self) -> Result<(), CacheError> {
        let _guard = self.flush_lock.lock();
        self.memory.clear();
        self.dirty.clear();
        self.live.clear();
        if let Some(store) = &self.store {
            store.clear()?;
        }
        Ok(())
    }

    /// Drop persistent records the last flushed build did not use.
    pub fn prune(&self) -> Result<usize, CacheError> {
        let _guard = self.flush_lock.lock();
        match &self.store {
            Some(store) => store.prune(),
            None => Ok(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let persisted = self.store.as_ref().and_then(|store| match store.len() {
            Ok(len) => Some(len),
            Err(err) => {
                tracing::warn!(error = %err, "failed to count persistent cache entries");
                None
            }
        });

        CacheStats {
            entries: self.memory.len(),
            persisted,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stores: self.counters.stores.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            corruptions: self.counters.corruptions.load(Ordering::Relaxed),
        }
    }

    /// Size of the database file, when persistent.
    pub fn size_on_disk(&self) -> Option<u64> {
        self.store.as_ref().and_then(|store| store.size_on_disk().ok())
    }
}

/// Marks a build as in flight on an [`IncrementalCache`].
#[derive(Debug)]
#[must_use = "the build ends when the guard is dropped"]
pub struct BuildGuard<'a> {
    cache: &'a IncrementalCache,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        let mut builds = self.cache.builds.lock();
        *builds = builds.saturating_sub(1);
    }
}

/// Delete the database file in `dir`. Works even when the database was
/// written by an incompatible version. Returns whether a file was removed.
pub fn remove_database(dir: &Path) -> std::io::Result<bool> {
    let path = dir.join(DATABASE_FILE);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}
