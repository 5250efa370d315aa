//! Tidepool Build
//!
//! Runs the schema build step: start an embedded PostgreSQL server, apply the
//! project's changelog, generate Rust bindings from the migrated schema and
//! stop the server again.
//!
//! Use [`build_script::generate_from_manifest`] from `build.rs`, the
//! `tidepool` binary from the command line, or [`Orchestrator`] directly.

pub mod build_script;
pub mod config;
pub mod error;
pub mod orchestrator;

pub use crate::config::{BuildConfig, ChangelogSettings, DatabaseOptions, CONFIG_FILE, ENV_PREFIX};
pub use crate::error::{BuildError, BuildStage, ConfigError, OrchestrationError};
pub use crate::orchestrator::{
    normalize_generator, BuildOutcome, ChangelogRunner, DatabaseBootstrapper, DatabaseInstance, EmbeddedBootstrapper,
    GenerationToolRunner, MigrationRunner, Orchestrator, SchemaCodeGenerator, DEFAULT_DATABASE, DEFAULT_GENERATOR,
};
