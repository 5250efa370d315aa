//! Changelog-specific error types

use crate::connection::ConnectionError;
use crate::executor::ExecError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChangelogError {
    /// Could not connect to the target database
    #[error("Connection failed: {0}")]
    Connection(#[from] ConnectionError),

    /// Database execution error outside of a changeset (tracking tables, lock)
    #[error("Database error: {0}")]
    Database(#[from] ExecError),

    /// A changelog, include or sql file does not exist
    #[error("Changelog file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A referenced file resolves outside the project root
    #[error("'{}' does not resolve under the project root '{}'", .path.display(), .root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed document
    #[error("Invalid changelog '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// File extension the engine cannot read
    #[error("Unsupported changelog format for '{}' (supported: .xml, .yaml, .yml, .json, .sql)", .0.display())]
    UnsupportedFormat(PathBuf),

    /// A changelog includes itself, directly or transitively
    #[error("Include cycle detected at '{}'", .0.display())]
    IncludeCycle(PathBuf),

    #[error("Changeset {file}::{id}::{author} is declared more than once")]
    DuplicateChangeSet {
        id: String,
        author: String,
        file: String,
    },

    /// An applied changeset was edited afterwards
    #[error(
        "Changeset {file}::{id}::{author} has been modified after being applied.\n\
         Stored checksum: {stored}\n\
         Current checksum: {current}\n\
         Mark it runOnChange or add a new changeset instead of editing an applied one."
    )]
    ChecksumMismatch {
        id: String,
        author: String,
        file: String,
        stored: String,
        current: String,
    },

    /// Changelog lock timeout
    #[error(
        "Changelog lock timeout: {0}\n\
         Another process may be applying changes. If this persists, reset the lock with:\n\
         UPDATE databasechangeloglock SET locked = FALSE WHERE id = 1"
    )]
    LockTimeout(String),

    /// A changeset failed while executing
    #[error("Changeset {file}::{id}::{author} failed: {source}")]
    ExecutionFailed {
        id: String,
        author: String,
        file: String,
        #[source]
        source: ExecError,
    },

    /// Canonical serialization used for checksums failed
    #[error("Failed to compute checksum: {0}")]
    Checksum(#[from] serde_json::Error),
}

impl ChangelogError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ChangelogError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
