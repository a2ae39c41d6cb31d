//! Shared utilities for command implementations.

use std::path::{Path, PathBuf};

use strata_bundler::{BuildOptions, PartitionPolicy};
use strata_config::{ConfigOverrides, ProjectConfig};
use strata_graph::{ModuleGraph, load_graph_file};

use crate::cli::ProjectArgs;
use crate::error::{CliError, Result};

/// Resolve a path relative to a working directory.
pub fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// The `--cwd` flag made absolute, or the process working directory.
pub fn resolve_cwd(cwd: Option<&Path>) -> Result<PathBuf> {
    let current = std::env::current_dir()?;
    let cwd = match cwd {
        Some(dir) => resolve_path(dir, &current),
        None => current,
    };
    if !cwd.is_dir() {
        return Err(CliError::InvalidArgument(format!(
            "Working directory does not exist: {}",
            cwd.display()
        )));
    }
    Ok(cwd)
}

/// Overrides shared by every project command. Paths given on the command
/// line are relative to `cwd`, not to the directory of strata.toml.
pub fn project_overrides(args: &ProjectArgs, cwd: &Path) -> ConfigOverrides {
    let mut overrides = ConfigOverrides {
        graph: args.graph.as_deref().map(|p| resolve_path(p, cwd)),
        ..ConfigOverrides::default()
    };
    overrides.cache.dir = args.cache_dir.as_deref().map(|p| resolve_path(p, cwd));
    if args.no_cache {
        overrides.cache.enabled = Some(false);
    }
    overrides
}

/// Load strata.toml and every other configuration layer.
pub fn load_project(
    cwd: &Path,
    config: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ProjectConfig> {
    let project = ProjectConfig::load(cwd, config, overrides)?;
    match &project.file {
        Some(file) => tracing::debug!(config = %file.display(), "using configuration file"),
        None => tracing::debug!("no strata.toml found, using defaults"),
    }
    Ok(project)
}

/// Everything one build needs, read fresh from disk.
#[derive(Debug)]
pub struct BuildInputs {
    pub graph: ModuleGraph,
    pub policy: PartitionPolicy,
    pub options: BuildOptions,
}

/// Load the graph file and derive the partition policy and build options.
///
/// Blocking: reads the graph and every module's content.
pub fn prepare_build(project: &ProjectConfig) -> Result<BuildInputs> {
    let graph_path = project.graph_path();
    let graph = load_graph_file(&graph_path, &project.root)?;
    let policy = project.partition_policy(&graph)?;
    let options = project.build_options();
    options.validate()?;

    tracing::debug!(
        graph = %graph_path.display(),
        modules = graph.len(),
        entries = policy.entries.len(),
        mode = options.mode.as_str(),
        "prepared build"
    );

    Ok(BuildInputs {
        graph,
        policy,
        options,
    })
}
