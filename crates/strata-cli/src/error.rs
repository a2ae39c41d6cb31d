//! Error handling for the strata CLI.
//!
//! Library errors convert into [`CliError`] through `From`, so commands use
//! `?` throughout. At the top level [`cli_error_to_miette`] turns the error
//! into a `miette` report: bundler errors keep their diagnostic code and
//! help, configuration errors carry their hint.

use std::path::PathBuf;

use miette::Report;
use strata_bundler::{CacheError, GraphError};
use strata_config::ConfigError;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// strata.toml, environment or flags are unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The graph file could not be loaded
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The build itself failed
    #[error(transparent)]
    Build(#[from] strata_bundler::Error),

    /// Cache maintenance failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A background task panicked or was aborted
    #[error("Task failed: {0}")]
    Task(String),

    #[error("{0}")]
    Custom(String),
}

impl From<tokio::task::JoinError> for CliError {
    fn from(err: tokio::task::JoinError) -> Self {
        CliError::Task(err.to_string())
    }
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Append a hint to the error message.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the error message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match e.into() {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}

/// Convert a CLI error into a `miette` report.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(e) => Report::new(e),
        CliError::Graph(e) => Report::new(strata_bundler::Error::Graph(e)),
        CliError::Config(e) => match e.hint() {
            Some(hint) => miette::miette!(help = hint.to_string(), "Configuration error: {}", e),
            None => miette::miette!("Configuration error: {}", e),
        },
        CliError::Cache(e) => miette::miette!(
            help = "Run `strata cache clear` to start from an empty cache.",
            "Cache error: {}",
            e
        ),
        other => miette::miette!("{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic;

    #[test]
    fn test_graph_errors_keep_their_code() {
        let report = cli_error_to_miette(CliError::Graph(GraphError::NoEntries));
        assert_eq!(report.code().unwrap().to_string(), "strata::graph");
    }

    #[test]
    fn test_config_hint_becomes_help() {
        let err = CliError::Config(ConfigError::MissingField {
            field: "graph".into(),
            hint: "Point `graph` at the graph file".into(),
        });
        let report = cli_error_to_miette(err);
        assert!(report.help().unwrap().to_string().contains("graph file"));
    }

    #[test]
    fn test_result_ext_with_path() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        let err = result.with_path("/test/graph.json").unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(_)));
    }

    #[test]
    fn test_result_ext_with_hint_and_context() {
        let result: std::result::Result<(), CliError> = Err(CliError::Custom("boom".into()));
        let msg = result.with_hint("Try again").unwrap_err().to_string();
        assert!(msg.contains("Hint: Try again"));

        let result: std::result::Result<(), CliError> = Err(CliError::Custom("boom".into()));
        let msg = result.context("Failed to start").unwrap_err().to_string();
        assert_eq!(msg, "Failed to start: boom");
    }
}
