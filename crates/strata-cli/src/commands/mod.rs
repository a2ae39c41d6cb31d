//! Command implementations.
//!
//! - [`build`] - one build, development or production
//! - [`watch`] - development rebuilds on file changes
//! - [`cache`] - persistent cache maintenance
//!
//! Each command provides an `execute` function that takes its parsed
//! arguments.

pub mod build;
pub mod cache;
pub mod utils;
pub mod watch;

pub use build::execute as build_execute;
pub use cache::execute as cache_execute;
pub use watch::execute as watch_execute;

pub(crate) use build::run_build;
