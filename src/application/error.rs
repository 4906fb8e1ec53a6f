//! Application-level errors (wraps domain errors)

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add loading context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        ApplicationError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
