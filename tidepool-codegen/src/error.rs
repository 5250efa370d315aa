//! Error types for codegen

use std::path::PathBuf;
use thiserror::Error;
use tidepool::{ConnectionError, ExecError};

#[derive(Debug, Error)]
pub enum CodegenError {
    /// The configuration carries no connection descriptor
    #[error("No database connection configured")]
    MissingConnection,

    #[error("Unsupported driver '{0}' (expected 'may_postgres')")]
    UnsupportedDriver(String),

    /// A required name (generator or database) was not set
    #[error("Missing {0} name in generator configuration")]
    MissingName(&'static str),

    #[error("Unknown database '{0}' (available: postgres)")]
    UnknownDatabase(String),

    #[error("Unknown generator '{0}' (available: rust)")]
    UnknownGenerator(String),

    #[error("Invalid {kind} pattern '{pattern}': {source}")]
    InvalidPattern {
        kind: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Connection failed: {0}")]
    Connection(#[from] ConnectionError),

    /// Schema introspection query failed
    #[error("Introspection failed: {0}")]
    Introspection(#[from] ExecError),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration '{}': {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("Code generation failed: {0}")]
    Generation(String),
}

impl CodegenError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CodegenError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodegenError>;
