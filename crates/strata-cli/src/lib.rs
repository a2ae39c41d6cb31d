//! Command-line interface for the strata bundler.
//!
//! - [`cli`] - argument definitions (clap derive)
//! - [`commands`] - `build`, `watch` and `cache` implementations
//! - [`error`] - CLI errors and their conversion to `miette` reports
//! - [`logger`] - `tracing` subscriber setup
//! - [`ui`] - colored status messages and build summaries
//! - [`dev`] - file watching for `strata watch`

pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result, ResultExt};
