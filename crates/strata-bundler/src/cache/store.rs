//! redb-backed chunk store.
//!
//! A single database file `<cache_dir>/cache.redb` with two tables: cached
//! chunk records keyed by hex cache key, and cache-wide metadata (format
//! version and the key set used by the last successful build).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::entry::{CACHE_FORMAT_VERSION, CacheCorruptionError, CachedChunk};
use super::key::CacheKey;

/// Cache table: maps cache keys to bincode-encoded chunk records.
const CACHE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("cache");

/// Metadata table: stores cache-wide metadata.
const METADATA_TABLE: TableDefinition<&str, &str> = TableDefinition::new("metadata");

const FORMAT_VERSION_KEY: &str = "format_version";
const LAST_BUILD_KEYS: &str = "last_build_keys";

/// File name of the database inside the cache directory.
pub const DATABASE_FILE: &str = "cache.redb";

/// Error types for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Cache database error.
    #[error("cache database error: {0}")]
    Database(String),

    /// Record could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record could not be decoded.
    #[error("cache entry {key} could not be decoded: {message}")]
    Deserialization { key: String, message: String },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Database was written by an incompatible version.
    #[error("cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: String },

    /// Entry failed its integrity check.
    #[error(transparent)]
    Corrupted(#[from] CacheCorruptionError),
}

impl From<redb::Error> for CacheError {
    fn from(err: redb::Error) -> Self {
        CacheError::Database(err.to_string())
    }
}

impl From<redb::DatabaseError> for CacheError {
    fn from(err: redb::DatabaseError) -> Self {
        CacheError::Database(err.to_string())
    }
}

impl From<redb::TableError> for CacheError {
    fn from(err: redb::TableError) -> Self {
        CacheError::Database(err.to_string())
    }
}

impl From<redb::TransactionError> for CacheError {
    fn from(err: redb::TransactionError) -> Self {
        CacheError::Database(err.to_string())
    }
}

impl From<redb::StorageError> for CacheError {
    fn from(err: redb::StorageError) -> Self {
        CacheError::Database(err.to_string())
    }
}

impl From<redb::CommitError> for CacheError {
    fn from(err: redb::CommitError) -> Self {
        CacheError::Database(err.to_string())
    }
}

/// Persistent chunk store using redb.
pub struct CacheStore {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore").field("path", &self.path).finish()
    }
}

impl CacheStore {
    /// Open or create a store in `cache_dir`.
    ///
    /// # Errors
    ///
    /// I/O and database errors, or [`CacheError::VersionMismatch`] when the
    /// database was written with a different record format.
    pub fn open(cache_dir: &Path) -> Result<Self, CacheError> {
        std::fs::create_dir_all(cache_dir)?;

        let path = cache_dir.join(DATABASE_FILE);
        let db = Database::create(&path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CACHE_TABLE)?;
            let mut metadata = write_txn.open_table(METADATA_TABLE)?;
            let found = metadata
                .get(FORMAT_VERSION_KEY)?
                .map(|v| v.value().to_string());
            match found {
                Some(found) if found != CACHE_FORMAT_VERSION.to_string() => {
                    return Err(CacheError::VersionMismatch {
                        expected: CACHE_FORMAT_VERSION,
                        found,
                    });
                }
                Some(_) => {}
                None => {
                    let version = CACHE_FORMAT_VERSION.to_string();
                    metadata.insert(FORMAT_VERSION_KEY, version.as_str())?;
                }
            }
        }
        write_txn.commit()?;

        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a cached chunk by key.
    ///
    /// Returns `Ok(None)` on a miss. Integrity is not checked here.
    pub fn get(&self, key: &CacheKey) -> Result<Option<CachedChunk>, CacheError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CACHE_TABLE)?;

        let Some(value) = table.get(key.as_hex())? else {
            return Ok(None);
        };

        let cached: CachedChunk =
            bincode::deserialize(value.value()).map_err(|e| CacheError::Deserialization {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(Some(cached))
    }

    /// Store a single chunk.
    pub fn put(&self, key: &CacheKey, chunk: &CachedChunk) -> Result<(), CacheError> {
        self.commit([(key, chunk)], None)
    }

    /// Write `entries` and, if given, record `live_keys` as the last build's
    /// key set, all in one transaction.
    pub fn commit<'a, I>(
        &self,
        entries: I,
        live_keys: Option<&BTreeSet<CacheKey>>,
    ) -> Result<(), CacheError>
    where
        I: IntoIterator<Item = (&'a CacheKey, &'a CachedChunk)>,
    {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CACHE_TABLE)?;
            for (key, chunk) in entries {
                let bytes = bincode::serialize(chunk)
                    .map_err(|e| CacheError::Serialization(e.to_string()))?;
                table.insert(key.as_hex(), bytes.as_slice())?;
            }
        }
        if let Some(live) = live_keys {
            let joined = live
                .iter()
                .map(CacheKey::as_hex)
                .collect::<Vec<_>>()
                .join("\n");
            let mut metadata = write_txn.open_table(METADATA_TABLE)?;
            metadata.insert(LAST_BUILD_KEYS, joined.as_str())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    /// Remove a cached chunk by key.
    pub fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CACHE_TABLE)?;
            table.remove(key.as_hex())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    pub fn contains(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CACHE_TABLE)?;

        Ok(table.get(key.as_hex())?.is_some())
    }

    /// Clear all cached entries and the recorded build key set.
    pub fn clear(&self) -> Result<(), CacheError> {
        let write_txn = self.db.begin_write()?;
        {
            write_txn.delete_table(CACHE_TABLE)?;
            let _ = write_txn.open_table(CACHE_TABLE)?;
            let mut metadata = write_txn.open_table(METADATA_TABLE)?;
            metadata.remove(LAST_BUILD_KEYS)?;
        }
        write_txn.commit()?;

        Ok(())
    }

    /// Get the number of cached entries.
    pub fn len(&self) -> Result<usize, CacheError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CACHE_TABLE)?;

        Ok(table.iter()?.count())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    /// Keys recorded by the last successful build, if any build recorded them.
    pub fn last_build_keys(&self) -> Result<Option<BTreeSet<CacheKey>>, CacheError> {
        let read_txn = self.db.begin_read()?;
        let metadata = read_txn.open_table(METADATA_TABLE)?;

        Ok(metadata.get(LAST_BUILD_KEYS)?.map(|value| {
            value
                .value()
                .lines()
                .filter(|line| !line.is_empty())
                .map(CacheKey::from_hex)
                .collect()
        }))
    }

    /// Remove every entry the last build did not use. Returns how many were
    /// removed; nothing is removed when no build has been recorded.
    pub fn prune(&self) -> Result<usize, CacheError> {
        let Some(live) = self.last_build_keys()? else {
            return Ok(0);
        };

        let write_txn = self.db.begin_write()?;
        let removed;
        {
            let mut table = write_txn.open_table(CACHE_TABLE)?;
            let mut stale = Vec::new();
            for item in table.iter()? {
                let (key, _) = item?;
                let key = key.value().to_string();
                if !live.contains(&CacheKey::from_hex(key.as_str())) {
                    stale.push(key);
                }
            }
            for key in &stale {
                table.remove(key.as_str())?;
            }
            removed = stale.len();
        }
        write_txn.commit()?;

        Ok(removed)
    }

    /// Size of the database file in bytes.
    pub fn size_on_disk(&self) -> Result<u64, CacheError> {
        Ok(std::fs::metadata(&self.path)?.len())
    }
}
