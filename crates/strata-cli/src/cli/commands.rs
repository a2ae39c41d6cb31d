use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::cli::enums::Mode;
use crate::cli::validation::{parse_hash_length, parse_jobs};

/// Available strata subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the project once
    ///
    /// Development builds print the manifest to stdout unless --write is
    /// given. Production builds replace the output directory atomically.
    Build(BuildArgs),

    /// Rebuild in development mode whenever a source file changes
    ///
    /// Unchanged chunks are served from the incremental cache.
    Watch(WatchArgs),

    /// Inspect or maintain the persistent cache
    Cache(CacheArgs),
}

/// Where the project lives and which inputs it uses.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Working directory; strata.toml is searched from here upwards
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Explicit config file instead of discovery
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Graph file written by the resolver
    #[arg(short, long, value_name = "FILE")]
    pub graph: Option<PathBuf>,

    /// Directory of the persistent cache
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Keep the cache in memory for this run only
    #[arg(long, conflicts_with = "cache_dir")]
    pub no_cache: bool,
}

/// Arguments for `strata build`
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Build mode (default: production, or `mode` from strata.toml)
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Output directory
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Publish development builds to the output directory
    #[arg(long)]
    pub write: bool,

    /// Ignore every cached chunk
    #[arg(long)]
    pub force: bool,

    /// Identity characters in production file names (4-64)
    #[arg(long, value_name = "N", value_parser = parse_hash_length)]
    pub hash_length: Option<usize>,

    /// Worker threads (default: one per core)
    #[arg(short, long, value_name = "N", value_parser = parse_jobs)]
    pub jobs: Option<usize>,
}

/// Arguments for `strata watch`
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output directory, used with --write
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Publish every rebuild to the output directory
    #[arg(long)]
    pub write: bool,

    /// Worker threads (default: one per core)
    #[arg(short, long, value_name = "N", value_parser = parse_jobs)]
    pub jobs: Option<usize>,

    /// Quiet period before a burst of changes triggers a rebuild
    #[arg(long, value_name = "MS", default_value_t = 100)]
    pub debounce: u64,
}

/// Arguments for `strata cache`
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show record count and size
    Stats(CacheStatsArgs),

    /// Delete the cache database
    Clear(CacheTargetArgs),

    /// Drop records the last build did not use
    Prune(CacheTargetArgs),
}

/// Which cache to operate on.
#[derive(Args, Debug, Clone, Default)]
pub struct CacheTargetArgs {
    /// Working directory; strata.toml is searched from here upwards
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Explicit config file instead of discovery
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory (default: `cache.dir` from strata.toml)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CacheStatsArgs {
    #[command(flatten)]
    pub target: CacheTargetArgs,

    /// Print machine readable JSON to stdout
    #[arg(long)]
    pub json: bool,
}
