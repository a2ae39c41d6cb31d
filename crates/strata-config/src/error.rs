//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid value for '{field}': {value}")]
    InvalidValue {
        field: String,
        value: String,
        hint: String,
    },

    #[error("missing required field '{field}'")]
    MissingField { field: String, hint: String },

    /// A layer could not be parsed or extracted.
    #[error("failed to load configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Suggestion shown under the error, when there is one.
    pub fn hint(&self) -> Option<&str> {
        match self {
            ConfigError::InvalidValue { hint, .. } | ConfigError::MissingField { hint, .. } => {
                Some(hint)
            }
            ConfigError::NotFound(_) => Some("Check the --config path or remove the flag to use discovery"),
            ConfigError::Figment(_) => Some("Check strata.toml syntax and STRATA_* environment variables"),
            ConfigError::Io(_) => None,
        }
    }

    pub(crate) fn invalid(field: &str, value: impl ToString, hint: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            hint: hint.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Figment(Box::new(err))
    }
}
