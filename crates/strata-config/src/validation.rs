use std::collections::BTreeMap;
use std::path::Path;

use path_clean::PathClean;
use strata_bundler::build::HASH_LENGTH_RANGE;
use strata_graph::ModuleId;

use crate::error::{ConfigError, Result};
use crate::loading::ProjectConfig;
use crate::types::StrataConfig;

/// Parse a configured module id.
pub(crate) fn module_id(field: &str, raw: &str) -> Result<ModuleId> {
    ModuleId::new(raw).map_err(|err| {
        ConfigError::invalid(
            field,
            raw,
            format!("{err}. Module ids are project-relative paths such as 'src/main.js'"),
        )
    })
}

impl StrataConfig {
    /// Check values for consistency. Paths are not checked for existence.
    pub fn validate(&self) -> Result<()> {
        if self.graph.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "graph".to_string(),
                hint: "Point `graph` at the resolver's graph file, e.g. \"strata-graph.json\""
                    .to_string(),
            });
        }

        if self.out_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "out_dir".to_string(),
                hint: "Set `out_dir`, e.g. \"dist\"".to_string(),
            });
        }

        if !HASH_LENGTH_RANGE.contains(&self.hash_length) {
            return Err(ConfigError::invalid(
                "hash_length",
                self.hash_length,
                format!(
                    "Must be between {} and {}",
                    HASH_LENGTH_RANGE.start(),
                    HASH_LENGTH_RANGE.end()
                ),
            ));
        }

        if self.jobs == Some(0) {
            return Err(ConfigError::invalid(
                "jobs",
                0,
                "Use at least one worker, or leave `jobs` unset for one per core",
            ));
        }

        if self.cache.max_entries == Some(0) {
            return Err(ConfigError::invalid(
                "cache.max_entries",
                0,
                "Leave `max_entries` unset for an unbounded cache",
            ));
        }

        let file_name = &self.manifest.file_name;
        if file_name.trim().is_empty() || file_name.contains(['/', '\\']) {
            return Err(ConfigError::invalid(
                "manifest.file_name",
                file_name,
                "Use a plain file name such as \"manifest.json\"",
            ));
        }

        let mut entry_modules: BTreeMap<ModuleId, &str> = BTreeMap::new();
        for (name, raw) in &self.entries {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "entries",
                    raw,
                    "Entry names must not be empty",
                ));
            }
            let module = module_id(&format!("entries.{name}"), raw)?;
            if let Some(first) = entry_modules.insert(module, name) {
                return Err(ConfigError::invalid(
                    &format!("entries.{name}"),
                    raw,
                    format!("Entry '{first}' already uses this module. Each entry needs its own module"),
                ));
            }
        }

        for raw in &self.shared {
            module_id("shared", raw)?;
        }
        for raw in &self.dynamic {
            module_id("dynamic", raw)?;
        }

        Ok(())
    }
}

impl ProjectConfig {
    /// Reject an `out_dir` that would take other project files with it.
    ///
    /// Publishing replaces the output directory as a whole, so it must not
    /// be, or contain, the project root, the graph file or the cache.
    pub fn validate_paths(&self) -> Result<()> {
        let out_dir = self.out_dir().clean();
        let protected = [
            ("project root", self.root.clean()),
            ("graph file", self.graph_path().clean()),
            ("cache directory", self.cache_dir().clean()),
        ];
        for (what, path) in protected {
            if path.starts_with(&out_dir) {
                return Err(ConfigError::invalid(
                    "out_dir",
                    display(&self.config.out_dir),
                    format!(
                        "The output directory is replaced on every build and would remove the {what} ({}). Use a dedicated directory such as \"dist\"",
                        path.display()
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
