//! `strata build`: one build, development or production.

use std::io::Write as _;
use std::sync::Arc;

use strata_bundler::{BuildContext, BuildResult, CancellationToken, IncrementalCache};
use strata_config::{ConfigOverrides, ProjectConfig};

use crate::cli::BuildArgs;
use crate::commands::utils;
use crate::error::Result;
use crate::ui;

/// Execute the build command.
///
/// 1. Load configuration (flags > environment > strata.toml > defaults)
/// 2. Read the graph file and module contents
/// 3. Partition, hash and serialize on the blocking pool
/// 4. Publish, or print the manifest for unpublished development builds
///
/// Ctrl-C cancels the build; nothing is published in that case.
pub async fn execute(args: BuildArgs) -> Result<()> {
    let cwd = utils::resolve_cwd(args.project.cwd.as_deref())?;
    let overrides = overrides(&args, &cwd);
    let project = utils::load_project(&cwd, args.project.config.as_deref(), &overrides)?;

    let cache = Arc::new(IncrementalCache::open(project.cache_config()));
    let token = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(token.clone());

    let result = run_build(project, cache, token).await;
    interrupt.abort();
    let result = result?;

    report(&result)?;
    Ok(())
}

fn overrides(args: &BuildArgs, cwd: &std::path::Path) -> ConfigOverrides {
    let mut overrides = utils::project_overrides(&args.project, cwd);
    overrides.mode = args.mode.map(Into::into);
    overrides.out_dir = args.out_dir.as_deref().map(|p| utils::resolve_path(p, cwd));
    overrides.write = args.write.then_some(true);
    overrides.hash_length = args.hash_length;
    overrides.jobs = args.jobs;
    if args.force {
        overrides.cache.force_rebuild = Some(true);
    }
    overrides
}

/// Cancel `token` on the first Ctrl-C. Abort the handle once the build is done.
pub(crate) fn cancel_on_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling build");
            token.cancel();
        }
    })
}

/// Load the graph and build it on the blocking pool.
pub(crate) async fn run_build(
    project: ProjectConfig,
    cache: Arc<IncrementalCache>,
    token: CancellationToken,
) -> Result<BuildResult> {
    tokio::task::spawn_blocking(move || -> Result<BuildResult> {
        let inputs = utils::prepare_build(&project)?;
        let result = BuildContext::new(inputs.graph, inputs.policy, inputs.options)
            .with_cache(cache)
            .with_cancellation(token)
            .build()?;
        Ok(result)
    })
    .await?
}

/// Warnings, summary, and either the publish location or the manifest on stdout.
pub(crate) fn report(result: &BuildResult) -> Result<()> {
    for orphan in result.orphans() {
        ui::warning(&format!("Excluded orphan module '{}'", orphan.module));
    }

    ui::print_build_summary(result);

    match result.published_to() {
        Some(dir) => ui::success(&format!(
            "Published {} files to {}",
            result.artifacts().len(),
            dir.display()
        )),
        None => {
            let json = result.manifest().to_json()?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&json)?;
            stdout.write_all(b"\n")?;
            stdout.flush()?;
            ui::info("Development build kept in memory; pass --write to publish it");
        }
    }

    Ok(())
}
