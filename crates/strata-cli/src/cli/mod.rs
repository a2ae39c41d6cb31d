//! Command-line interface definition.
//!
//! - `strata build` - one build, development or production
//! - `strata watch` - development rebuilds on file changes
//! - `strata cache` - inspect and maintain the persistent cache

mod commands;
pub mod enums;
mod validation;

use clap::Parser;

pub use commands::{
    BuildArgs, CacheArgs, CacheCommand, CacheStatsArgs, CacheTargetArgs, Command, ProjectArgs,
    WatchArgs,
};
pub use enums::*;
pub use validation::{parse_hash_length, parse_jobs};

/// strata - incremental chunking bundler
#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Incremental chunking bundler",
    long_about = "strata partitions a resolved module graph into entry, shared and dynamic\n\
                  chunks, names every chunk by a content hash, and rebuilds only the\n\
                  chunks whose inputs changed."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}
