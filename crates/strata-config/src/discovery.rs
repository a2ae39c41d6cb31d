//! Locating `strata.toml`.

use std::path::{Path, PathBuf};

/// Config file name looked up in the project root.
pub const CONFIG_FILE: &str = "strata.toml";

/// Walks up from a starting directory looking for [`CONFIG_FILE`].
///
/// # Example
///
/// ```no_run
/// use strata_config::ConfigDiscovery;
///
/// let found = ConfigDiscovery::new(".").find();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigDiscovery {
    start: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(start: impl AsRef<Path>) -> Self {
        Self {
            start: start.as_ref().to_path_buf(),
        }
    }

    /// Nearest `strata.toml` in the start directory or one of its ancestors.
    pub fn find(&self) -> Option<PathBuf> {
        self.start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Project root: the directory of the discovered config file, or the
    /// start directory when there is none.
    pub fn root(&self) -> PathBuf {
        self.find()
            .and_then(|file| file.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| self.start.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn find_returns_none_without_config() {
        let dir = TempDir::new().unwrap();
        let found = ConfigDiscovery::new(dir.path()).find();
        // Only a file above the temp dir can match.
        assert!(found.is_none_or(|file| !file.starts_with(dir.path())));
    }

    #[test]
    fn find_walks_up_to_the_project_root() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join(CONFIG_FILE);
        fs::write(&config, "mode = \"development\"\n").unwrap();
        let nested = dir.path().join("src/pages");
        fs::create_dir_all(&nested).unwrap();

        let discovery = ConfigDiscovery::new(&nested);
        assert_eq!(discovery.find().unwrap(), config);
        assert_eq!(discovery.root(), dir.path());
    }

    #[test]
    fn nearest_config_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "").unwrap();
        let inner = dir.path().join("app");
        fs::create_dir_all(&inner).unwrap();
        fs::write(inner.join(CONFIG_FILE), "").unwrap();

        assert_eq!(ConfigDiscovery::new(&inner).root(), inner);
    }
}
