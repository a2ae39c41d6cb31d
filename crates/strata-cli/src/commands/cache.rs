//! `strata cache`: inspect and maintain the persistent cache.

use std::path::PathBuf;

use serde::Serialize;
use strata_bundler::cache::{CacheStore, DATABASE_FILE, remove_database};
use strata_config::ConfigOverrides;

use crate::cli::{CacheArgs, CacheCommand, CacheTargetArgs};
use crate::commands::utils;
use crate::error::Result;
use crate::ui;

/// Execute a cache subcommand.
pub async fn execute(args: CacheArgs) -> Result<()> {
    match args.command {
        CacheCommand::Stats(stats) => {
            let dir = cache_dir(&stats.target)?;
            let report = tokio::task::spawn_blocking(move || CacheReport::read(dir)).await??;
            if stats.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        CacheCommand::Clear(target) => {
            let dir = cache_dir(&target)?;
            if remove_database(&dir)? {
                ui::success(&format!("Cleared cache in {}", dir.display()));
            } else {
                ui::info(&format!("No cache in {}", dir.display()));
            }
        }
        CacheCommand::Prune(target) => {
            let dir = cache_dir(&target)?;
            if !dir.join(DATABASE_FILE).is_file() {
                ui::info(&format!("No cache in {}", dir.display()));
                return Ok(());
            }
            let removed = tokio::task::spawn_blocking(move || CacheStore::open(&dir)?.prune()).await??;
            ui::success(&format!("Pruned {removed} records not used by the last build"));
        }
    }
    Ok(())
}

/// `--cache-dir` if given, otherwise `cache.dir` from the configuration.
fn cache_dir(target: &CacheTargetArgs) -> Result<PathBuf> {
    let cwd = utils::resolve_cwd(target.cwd.as_deref())?;
    if let Some(dir) = &target.cache_dir {
        return Ok(utils::resolve_path(dir, &cwd));
    }
    let project = utils::load_project(&cwd, target.config.as_deref(), &ConfigOverrides::default())?;
    Ok(project.cache_dir())
}

/// What `strata cache stats` shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheReport {
    pub dir: PathBuf,
    pub exists: bool,
    pub records: usize,
    pub bytes: u64,
    /// Records the last build used; `None` before the first build.
    pub last_build: Option<usize>,
}

impl CacheReport {
    /// Read the database in `dir`, if there is one.
    pub fn read(dir: PathBuf) -> Result<Self> {
        if !dir.join(DATABASE_FILE).is_file() {
            return Ok(Self {
                dir,
                exists: false,
                records: 0,
                bytes: 0,
                last_build: None,
            });
        }

        let store = CacheStore::open(&dir)?;
        Ok(Self {
            records: store.len()?,
            bytes: store.size_on_disk()?,
            last_build: store.last_build_keys()?.map(|keys| keys.len()),
            exists: true,
            dir,
        })
    }

    /// Records the last build did not use, and `cache prune` would remove.
    pub fn stale(&self) -> Option<usize> {
        self.last_build.map(|used| self.records.saturating_sub(used))
    }
}

fn print_report(report: &CacheReport) {
    if !report.exists {
        ui::info(&format!("No cache in {}", report.dir.display()));
        return;
    }
    ui::info(&format!("Cache: {}", report.dir.display()));
    ui::info(&format!("Records: {}", report.records));
    ui::info(&format!("Size: {}", ui::format_size(report.bytes)));
    match report.stale() {
        Some(stale) => ui::info(&format!("Unused by the last build: {stale}")),
        None => ui::info("No build has completed against this cache yet"),
    }
}
