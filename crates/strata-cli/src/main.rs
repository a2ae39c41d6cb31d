//! strata - incremental chunking bundler.

use clap::Parser;
use miette::Result;
use strata_cli::{cli, commands, error, logger, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color, args.quiet);

    let result = match args.command {
        cli::Command::Build(build_args) => commands::build_execute(build_args).await,
        cli::Command::Watch(watch_args) => commands::watch_execute(watch_args).await,
        cli::Command::Cache(cache_args) => commands::cache_execute(cache_args).await,
    };

    result.map_err(error::cli_error_to_miette)
}
