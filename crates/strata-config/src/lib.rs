//! # strata-config
//!
//! Discovery and layered loading of `strata.toml`.
//!
//! Layers, lowest priority first:
//!
//! 1. built-in defaults
//! 2. the nearest `strata.toml`, searching upwards from the working directory
//! 3. `STRATA_*` environment variables (`STRATA_CACHE__DIR` sets `cache.dir`)
//! 4. command line overrides
//!
//! ```toml
//! mode = "production"
//! graph = "strata-graph.json"
//! out_dir = "dist"
//! hash_length = 8
//! shared = ["node_modules/react/index.js"]
//! orphans = "exclude"
//!
//! [cache]
//! dir = ".strata-cache"
//! max_entries = 10000
//!
//! [manifest]
//! metadata = { release = "2024.06" }
//! ```

mod conversions;
mod defaults;
mod discovery;
mod error;
mod loading;
mod types;
mod validation;

pub use defaults::{DEFAULT_CACHE_DIR, DEFAULT_OUT_DIR};
pub use discovery::{CONFIG_FILE, ConfigDiscovery};
pub use error::{ConfigError, Result};
pub use loading::{ENV_PREFIX, ProjectConfig};
pub use types::{CacheOverrides, CacheSection, ConfigOverrides, ManifestSection, StrataConfig};
