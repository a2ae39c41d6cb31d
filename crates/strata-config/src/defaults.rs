use std::path::PathBuf;

use strata_bundler::DEFAULT_HASH_LENGTH;
use strata_bundler::manifest::MANIFEST_FILE;
use strata_graph::DEFAULT_GRAPH_FILE;

pub const DEFAULT_OUT_DIR: &str = "dist";
pub const DEFAULT_CACHE_DIR: &str = ".strata-cache";

pub fn default_graph() -> PathBuf {
    PathBuf::from(DEFAULT_GRAPH_FILE)
}

pub fn default_out_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUT_DIR)
}

pub fn default_hash_length() -> usize {
    DEFAULT_HASH_LENGTH
}

pub fn default_cache_enabled() -> bool {
    true
}

pub fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

pub fn default_manifest_file() -> String {
    MANIFEST_FILE.to_string()
}
