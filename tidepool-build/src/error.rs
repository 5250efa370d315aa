//! Error types for the build step

use std::path::PathBuf;
use thiserror::Error;
use tidepool::changelog::ChangelogError;
use tidepool::EmbeddedError;
use tidepool_codegen::CodegenError;

/// Progress of a build step
///
/// Steps only move forward. A failure after the database started still ends
/// in `TornDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStage {
    NotStarted,
    DatabaseRunning,
    Migrated,
    Generated,
    TornDown,
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BuildStage::NotStarted => "not started",
            BuildStage::DatabaseRunning => "database running",
            BuildStage::Migrated => "migrated",
            BuildStage::Generated => "generated",
            BuildStage::TornDown => "torn down",
        };
        f.write_str(name)
    }
}

/// Failure of [`crate::Orchestrator::execute`]
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Failed to start embedded Postgres: {0}")]
    DatabaseStartup(#[source] EmbeddedError),

    #[error("Changelog migration failed: {0}")]
    Migration(#[source] ChangelogError),

    #[error("Code generation failed: {0}")]
    Generation(#[source] CodegenError),

    #[error("Failed to stop embedded Postgres: {0}")]
    Teardown(#[source] EmbeddedError),

    /// Teardown failed while an earlier failure was already pending
    #[error("{failure} (and stopping embedded Postgres also failed: {teardown})")]
    TeardownAfterFailure {
        #[source]
        failure: Box<OrchestrationError>,
        teardown: EmbeddedError,
    },
}

impl OrchestrationError {
    /// Stage that was running when the (first) failure occurred
    pub fn stage(&self) -> BuildStage {
        match self {
            OrchestrationError::DatabaseStartup(_) => BuildStage::NotStarted,
            OrchestrationError::Migration(_) => BuildStage::DatabaseRunning,
            OrchestrationError::Generation(_) => BuildStage::Migrated,
            OrchestrationError::Teardown(_) => BuildStage::Generated,
            OrchestrationError::TeardownAfterFailure { failure, .. } => failure.stage(),
        }
    }
}

/// Errors loading a [`crate::BuildConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No tidepool configuration in {root}: expected tidepool.toml or [package.metadata.tidepool] in Cargo.toml")]
    NotFound { root: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
}

/// Errors from [`crate::build_script`]
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("CARGO_MANIFEST_DIR is not set; generate_from_manifest must run from a build script")]
    MissingManifestDir,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),
}
