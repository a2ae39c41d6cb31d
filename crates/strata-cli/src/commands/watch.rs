//! `strata watch`: development rebuilds on every source change.
//!
//! All rebuilds share one incremental cache, so an edit only recomputes the
//! chunks whose inputs changed. A failed rebuild is reported and the loop
//! keeps watching; the next change retries.

use std::path::Path;
use std::time::Duration;

use strata_bundler::{BuildMode, CancellationToken};
use strata_config::ConfigOverrides;

use crate::cli::WatchArgs;
use crate::commands::utils;
use crate::dev::{FileChange, FileWatcher, WatchSession, next_batch};
use crate::error::Result;
use crate::ui;

/// Execute the watch command.
pub async fn execute(args: WatchArgs) -> Result<()> {
    let cwd = utils::resolve_cwd(args.project.cwd.as_deref())?;
    let overrides = overrides(&args, &cwd);
    let mut session = WatchSession::open(cwd, args.project.config.clone(), overrides)?;

    let project = session.project()?;
    let ignored = vec![project.out_dir(), project.cache_dir()];

    ui::info("Performing initial build...");
    if rebuild(&mut session).await == Outcome::Interrupted {
        return Ok(());
    }

    let (watcher, mut changes) = FileWatcher::new(project.root.clone(), ignored, args.debounce)?;
    ui::info(&format!("Watching for changes in {}", watcher.root().display()));
    ui::info("Press Ctrl+C to stop");

    let quiet = Duration::from_millis(args.debounce);
    loop {
        tokio::select! {
            batch = next_batch(&mut changes, quiet) => {
                let Some(batch) = batch else {
                    ui::warning("File watcher stopped");
                    break;
                };
                announce(&batch, session.cwd());
                if rebuild(&mut session).await == Outcome::Interrupted {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    ui::success("Stopped watching");
    Ok(())
}

fn overrides(args: &WatchArgs, cwd: &Path) -> ConfigOverrides {
    let mut overrides = utils::project_overrides(&args.project, cwd);
    overrides.mode = Some(BuildMode::Development);
    overrides.out_dir = args.out_dir.as_deref().map(|p| utils::resolve_path(p, cwd));
    overrides.write = args.write.then_some(true);
    overrides.jobs = args.jobs;
    overrides
}

fn announce(batch: &[FileChange], cwd: &Path) {
    match batch {
        [single] => {
            let path = single.path();
            let shown = path.strip_prefix(cwd).unwrap_or(path);
            ui::info(&format!("File changed: {}", shown.display()));
        }
        many => ui::info(&format!("{} files changed", many.len())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Done,
    Interrupted,
}

/// One rebuild. Ctrl-C cancels it and ends the session.
async fn rebuild(session: &mut WatchSession) -> Outcome {
    let token = CancellationToken::new();
    let build = session.rebuild(token.clone());
    tokio::pin!(build);

    let result = tokio::select! {
        result = &mut build => result,
        _ = tokio::signal::ctrl_c() => {
            token.cancel();
            let _ = build.await;
            return Outcome::Interrupted;
        }
    };

    match result {
        Ok((result, changes)) => {
            for orphan in result.orphans() {
                ui::warning(&format!("Excluded orphan module '{}'", orphan.module));
            }
            let stats = result.stats();
            ui::success(&format!(
                "Built in {}: {}",
                ui::format_duration(stats.duration),
                changes.describe()
            ));
            if let Some(dir) = result.published_to() {
                ui::info(&format!("Wrote {} files to {}", result.artifacts().len(), dir.display()));
            }
        }
        Err(err) => ui::error(&format!("Build failed: {err}")),
    }
    Outcome::Done
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ProjectArgs;
    use std::path::PathBuf;

    #[test]
    fn test_watch_always_builds_in_development() {
        let args = WatchArgs {
            project: ProjectArgs::default(),
            out_dir: Some(PathBuf::from("public")),
            write: false,
            jobs: None,
            debounce: 100,
        };
        let overrides = overrides(&args, Path::new("/work"));
        assert_eq!(overrides.mode, Some(BuildMode::Development));
        assert_eq!(overrides.out_dir, Some(PathBuf::from("/work/public")));
        assert_eq!(overrides.write, None);
    }
}
