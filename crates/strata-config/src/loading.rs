use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format as _, Serialized, Toml};

use crate::discovery::ConfigDiscovery;
use crate::error::{ConfigError, Result};
use crate::types::{ConfigOverrides, StrataConfig};

/// Prefix of configuration environment variables; `__` separates sections,
/// as in `STRATA_CACHE__DIR`.
pub const ENV_PREFIX: &str = "STRATA_";

/// A loaded configuration together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub config: StrataConfig,
    /// Directory relative paths are resolved against.
    pub root: PathBuf,
    /// The `strata.toml` that was read, if any.
    pub file: Option<PathBuf>,
}

impl StrataConfig {
    /// Layers, lowest priority first: defaults, `file`, `STRATA_*`
    /// environment variables, `overrides`.
    pub fn figment(file: Option<&Path>, overrides: &ConfigOverrides) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(StrataConfig::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
    }
}

impl ProjectConfig {
    /// Discover `strata.toml` from `cwd` (or read `explicit`), merge every
    /// layer and validate the result.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NotFound`] when `explicit` does not exist
    /// - [`ConfigError::Figment`] when a layer cannot be parsed
    /// - validation errors from [`StrataConfig::validate`] and
    ///   [`ProjectConfig::validate_paths`]
    pub fn load(cwd: &Path, explicit: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let (root, file) = match explicit {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    cwd.join(path)
                };
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path));
                }
                let root = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| cwd.to_path_buf());
                (root, Some(path))
            }
            None => {
                let discovery = ConfigDiscovery::new(cwd);
                (discovery.root(), discovery.find())
            }
        };

        match &file {
            Some(path) => tracing::debug!(file = %path.display(), "loading configuration"),
            None => tracing::debug!(root = %root.display(), "no strata.toml found, using defaults"),
        }

        let config: StrataConfig = StrataConfig::figment(file.as_deref(), overrides).extract()?;
        config.validate()?;

        let project = Self { config, root, file };
        project.validate_paths()?;
        Ok(project)
    }

    /// Configuration without a file: defaults plus environment and overrides.
    pub fn from_overrides(root: impl Into<PathBuf>, overrides: &ConfigOverrides) -> Result<Self> {
        let config: StrataConfig = StrataConfig::figment(None, overrides).extract()?;
        config.validate()?;
        let project = Self {
            config,
            root: root.into(),
            file: None,
        };
        project.validate_paths()?;
        Ok(project)
    }

    /// `path` made absolute against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn graph_path(&self) -> PathBuf {
        self.resolve(&self.config.graph)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.resolve(&self.config.out_dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.resolve(&self.config.cache.dir)
    }
}
