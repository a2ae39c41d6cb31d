//! State carried between rebuilds of `strata watch`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_bundler::{BuildResult, CancellationToken, ChunkIdentity, IncrementalCache};
use strata_config::{ConfigOverrides, ProjectConfig};

use crate::commands::{run_build, utils};
use crate::error::Result;

/// Which chunks a rebuild touched, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkChanges {
    /// Present before and after, with a new identity.
    pub rebuilt: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: usize,
}

impl ChunkChanges {
    /// Compare two builds. Without a previous build every chunk is new.
    pub fn between(previous: Option<&BuildResult>, current: &BuildResult) -> Self {
        let before: BTreeMap<&str, ChunkIdentity> = previous
            .map(|result| {
                result
                    .chunks()
                    .iter()
                    .map(|c| (c.chunk.name(), c.identity))
                    .collect()
            })
            .unwrap_or_default();

        let mut changes = Self::default();
        for output in current.chunks() {
            match before.get(output.chunk.name()) {
                Some(identity) if *identity == output.identity => changes.unchanged += 1,
                Some(_) => changes.rebuilt.push(output.chunk.name().to_string()),
                None => changes.added.push(output.chunk.name().to_string()),
            }
        }
        for name in before.keys() {
            if current.chunk(name).is_none() {
                changes.removed.push((*name).to_string());
            }
        }
        changes
    }

    pub fn is_empty(&self) -> bool {
        self.rebuilt.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    /// One-line description, e.g. `1 rebuilt (entry:main), 2 unchanged`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        for (label, names) in [
            ("rebuilt", &self.rebuilt),
            ("added", &self.added),
            ("removed", &self.removed),
        ] {
            if !names.is_empty() {
                parts.push(format!("{} {label} ({})", names.len(), names.join(", ")));
            }
        }
        parts.push(format!("{} unchanged", self.unchanged));
        parts.join(", ")
    }
}

/// One watch session: the project location, the shared cache and the last
/// successful build.
pub struct WatchSession {
    cwd: PathBuf,
    config: Option<PathBuf>,
    overrides: ConfigOverrides,
    cache: Arc<IncrementalCache>,
    previous: Option<BuildResult>,
}

impl WatchSession {
    /// Load the configuration once to open the cache it names.
    pub fn open(cwd: PathBuf, config: Option<PathBuf>, overrides: ConfigOverrides) -> Result<Self> {
        let project = utils::load_project(&cwd, config.as_deref(), &overrides)?;
        let cache = Arc::new(IncrementalCache::open(project.cache_config()));
        Ok(Self {
            cwd,
            config,
            overrides,
            cache,
            previous: None,
        })
    }

    /// Configuration as it is on disk right now.
    pub fn project(&self) -> Result<ProjectConfig> {
        utils::load_project(&self.cwd, self.config.as_deref(), &self.overrides)
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn cache(&self) -> &Arc<IncrementalCache> {
        &self.cache
    }

    pub fn previous(&self) -> Option<&BuildResult> {
        self.previous.as_ref()
    }

    /// Reload configuration and graph, then build against the shared cache.
    /// A failed build keeps the previous result.
    pub async fn rebuild(&mut self, token: CancellationToken) -> Result<(&BuildResult, ChunkChanges)> {
        let project = self.project()?;
        let result = run_build(project, Arc::clone(&self.cache), token).await?;
        let changes = ChunkChanges::between(self.previous.as_ref(), &result);
        let current = self.previous.insert(result);
        Ok((current, changes))
    }
}
