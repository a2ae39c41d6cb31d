//! Turning a [`ProjectConfig`] into bundler inputs.

use strata_bundler::{BuildOptions, CacheConfig, PartitionPolicy};
use strata_graph::ModuleGraph;

use crate::error::Result;
use crate::loading::ProjectConfig;
use crate::validation::module_id;

impl ProjectConfig {
    pub fn build_options(&self) -> BuildOptions {
        let config = &self.config;
        let mut options = BuildOptions::default()
            .mode(config.mode)
            .hash_length(config.hash_length)
            .out_dir(self.out_dir())
            .write(config.write)
            .jobs(config.jobs)
            .manifest_file(config.manifest.file_name.clone());
        options.metadata = config.manifest.metadata.clone();
        options
    }

    /// Persistent under `cache.dir` unless the cache is disabled.
    pub fn cache_config(&self) -> CacheConfig {
        let section = &self.config.cache;
        let base = if section.enabled {
            CacheConfig::persistent(self.cache_dir())
        } else {
            CacheConfig::memory()
        };
        base.with_max_entries(section.max_entries)
            .with_force_rebuild(section.force_rebuild)
    }

    /// Partition roots for `graph`. Without configured entries the graph
    /// file's own entries are used.
    pub fn partition_policy(&self, graph: &ModuleGraph) -> Result<PartitionPolicy> {
        let config = &self.config;
        let mut policy = if config.entries.is_empty() {
            PartitionPolicy::from_graph(graph)
        } else {
            let mut policy = PartitionPolicy::new();
            for (name, raw) in &config.entries {
                policy = policy.entry(name.clone(), module_id(&format!("entries.{name}"), raw)?);
            }
            policy
        };

        for raw in &config.shared {
            policy = policy.shared(module_id("shared", raw)?);
        }
        for raw in &config.dynamic {
            policy = policy.dynamic_boundary(module_id("dynamic", raw)?);
        }
        policy = policy.orphans(config.orphans);

        Ok(policy)
    }
}
