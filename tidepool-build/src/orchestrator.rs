//! The build step: start a database, migrate it, generate from it, stop it
//!
//! Each collaborator sits behind a trait so the sequencing can run against
//! stand-ins. [`Orchestrator::new`] wires the real ones: an
//! [`EmbeddedPostgres`] server, the changelog [`Migrator`] and the codegen
//! [`GenerationTool`].

use crate::error::{BuildStage, OrchestrationError};
use std::path::Path;
use std::time::Duration;
use tidepool::changelog::{ChangelogError, Migrator, UpdateSummary, DEFAULT_LOCK_TIMEOUT};
use tidepool::{connect, EmbeddedError, EmbeddedPostgres, EmbeddedSettings, MayPostgresExecutor};
use tidepool_codegen::{CodegenError, Configuration, ConnectionDescriptor, GenerationReport, GenerationTool, Generator};

/// Generator used when the configuration names none
pub const DEFAULT_GENERATOR: &str = "rust";
/// Dialect of the bootstrapped engine, used when the configuration names none
pub const DEFAULT_DATABASE: &str = "postgres";

/// Starts a disposable database
pub trait DatabaseBootstrapper {
    fn start(&self) -> Result<Box<dyn DatabaseInstance>, EmbeddedError>;
}

/// A running database owned by a single build step
pub trait DatabaseInstance {
    fn port(&self) -> u16;

    /// URL for the default superuser and database
    fn url(&self) -> String;

    /// Stop the server and release everything it holds
    fn shutdown(self: Box<Self>) -> Result<(), EmbeddedError>;
}

/// Applies a changelog to a live database
pub trait MigrationRunner {
    /// `changelog` is resolved against `project_root`
    fn migrate(&self, url: &str, changelog: &Path, project_root: &Path) -> Result<UpdateSummary, ChangelogError>;
}

/// Generates sources from a live schema
pub trait SchemaCodeGenerator {
    fn generate(&self, configuration: &Configuration) -> Result<GenerationReport, CodegenError>;
}

/// [`DatabaseBootstrapper`] backed by [`EmbeddedPostgres`]
#[derive(Debug, Clone, Default)]
pub struct EmbeddedBootstrapper {
    settings: EmbeddedSettings,
}

impl EmbeddedBootstrapper {
    pub fn new(settings: EmbeddedSettings) -> Self {
        Self { settings }
    }
}

impl DatabaseBootstrapper for EmbeddedBootstrapper {
    fn start(&self) -> Result<Box<dyn DatabaseInstance>, EmbeddedError> {
        Ok(Box::new(EmbeddedPostgres::start(self.settings.clone())?))
    }
}

impl DatabaseInstance for EmbeddedPostgres {
    fn port(&self) -> u16 {
        EmbeddedPostgres::port(self)
    }

    fn url(&self) -> String {
        let credentials = self.credentials();
        self.connection_url(&credentials.user, &credentials.database)
    }

    fn shutdown(self: Box<Self>) -> Result<(), EmbeddedError> {
        (*self).close()
    }
}

/// [`MigrationRunner`] applying every changeset with the changelog [`Migrator`]
#[derive(Debug, Clone)]
pub struct ChangelogRunner {
    lock_timeout: Duration,
}

impl ChangelogRunner {
    pub fn new(lock_timeout: Duration) -> Self {
        Self { lock_timeout }
    }
}

impl Default for ChangelogRunner {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl MigrationRunner for ChangelogRunner {
    fn migrate(&self, url: &str, changelog: &Path, project_root: &Path) -> Result<UpdateSummary, ChangelogError> {
        let migrator = Migrator::load(project_root, changelog)?.with_lock_timeout(self.lock_timeout);
        let executor = MayPostgresExecutor::new(connect(url)?);
        migrator.update(&executor)
    }
}

/// [`SchemaCodeGenerator`] calling [`GenerationTool::generate`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationToolRunner;

impl SchemaCodeGenerator for GenerationToolRunner {
    fn generate(&self, configuration: &Configuration) -> Result<GenerationReport, CodegenError> {
        GenerationTool::generate(configuration)
    }
}

/// Result of a successful build step
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Always [`BuildStage::TornDown`]
    pub stage: BuildStage,
    /// Port the database listened on
    pub port: u16,
    pub migration: UpdateSummary,
    pub generation: GenerationReport,
}

/// Sequences one build step
pub struct Orchestrator {
    bootstrapper: Box<dyn DatabaseBootstrapper>,
    migration: Box<dyn MigrationRunner>,
    generator: Box<dyn SchemaCodeGenerator>,
}

impl Orchestrator {
    /// Orchestrator using an embedded server started with `settings`
    pub fn new(settings: EmbeddedSettings) -> Self {
        Self::with_collaborators(
            Box::new(EmbeddedBootstrapper::new(settings)),
            Box::new(ChangelogRunner::default()),
            Box::new(GenerationToolRunner),
        )
    }

    pub fn with_collaborators(
        bootstrapper: Box<dyn DatabaseBootstrapper>,
        migration: Box<dyn MigrationRunner>,
        generator: Box<dyn SchemaCodeGenerator>,
    ) -> Self {
        Self {
            bootstrapper,
            migration,
            generator,
        }
    }

    /// Replace the migration runner, e.g. to change the lock timeout
    pub fn with_migration_runner(mut self, migration: Box<dyn MigrationRunner>) -> Self {
        self.migration = migration;
        self
    }

    /// Run the build step
    ///
    /// The database is stopped whether migration and generation succeed or
    /// not. If it fails to stop while another error is pending, both are
    /// returned in [`OrchestrationError::TeardownAfterFailure`].
    pub fn execute(
        &self,
        changelog_path: &Path,
        generator: &Generator,
        project_root: &Path,
    ) -> Result<BuildOutcome, OrchestrationError> {
        let instance = self
            .bootstrapper
            .start()
            .map_err(OrchestrationError::DatabaseStartup)?;
        let port = instance.port();
        log::info!("Started embedded Postgres on port {}", port);

        let url = instance.url();
        let result = self.migrate_and_generate(&url, changelog_path, generator, project_root);

        let teardown = instance.shutdown();
        match &teardown {
            Ok(()) => log::debug!("Stage: {}", BuildStage::TornDown),
            Err(e) => log::error!("Failed to stop embedded Postgres on port {}: {}", port, e),
        }

        match (result, teardown) {
            (Ok((migration, generation)), Ok(())) => Ok(BuildOutcome {
                stage: BuildStage::TornDown,
                port,
                migration,
                generation,
            }),
            (Ok(_), Err(teardown)) => Err(OrchestrationError::Teardown(teardown)),
            (Err(failure), Ok(())) => Err(failure),
            (Err(failure), Err(teardown)) => Err(OrchestrationError::TeardownAfterFailure {
                failure: Box::new(failure),
                teardown,
            }),
        }
    }

    fn migrate_and_generate(
        &self,
        url: &str,
        changelog_path: &Path,
        generator: &Generator,
        project_root: &Path,
    ) -> Result<(UpdateSummary, GenerationReport), OrchestrationError> {
        log::debug!("Stage: {}", BuildStage::DatabaseRunning);
        log::info!(
            "Configuring changelog migration: changelog_file={}",
            changelog_path.display()
        );
        let migration = self
            .migration
            .migrate(url, changelog_path, project_root)
            .map_err(OrchestrationError::Migration)?;
        log::info!("Changelog ran successfully");
        log::debug!("Stage: {}", BuildStage::Migrated);

        log::info!("Configuring code generator");
        let configuration = Configuration {
            connection: Some(ConnectionDescriptor::postgres(url)),
            generator: normalize_generator(generator, project_root),
        };
        let generation = self
            .generator
            .generate(&configuration)
            .map_err(OrchestrationError::Generation)?;
        log::info!("Generated sources to '{}'", generation.output_dir.display());
        log::debug!("Stage: {}", BuildStage::Generated);

        Ok((migration, generation))
    }
}

/// Fill in the generator settings the caller may leave out
///
/// Missing generator and dialect names become [`DEFAULT_GENERATOR`] and
/// [`DEFAULT_DATABASE`]; a relative output directory is placed under
/// `project_root`.
pub fn normalize_generator(generator: &Generator, project_root: &Path) -> Generator {
    let mut generator = generator.clone();
    generator.name.get_or_insert_with(|| DEFAULT_GENERATOR.to_string());
    generator
        .database
        .name
        .get_or_insert_with(|| DEFAULT_DATABASE.to_string());
    if generator.target.directory.is_relative() {
        generator.target.directory = project_root.join(&generator.target.directory);
    }
    generator
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize_fills_defaults() {
        let normalized = normalize_generator(&Generator::default(), Path::new("/work/app"));
        assert_eq!(normalized.name.as_deref(), Some("rust"));
        assert_eq!(normalized.database.name.as_deref(), Some("postgres"));
        assert_eq!(normalized.target.directory, PathBuf::from("/work/app/src/generated"));
    }

    #[test]
    fn test_normalize_keeps_explicit_values() {
        let mut generator = Generator::default();
        generator.name = Some("RustGenerator".to_string());
        generator.database.name = Some("postgresql".to_string());
        generator.target.directory = PathBuf::from("/tmp/out");

        let normalized = normalize_generator(&generator, Path::new("/work/app"));
        assert_eq!(normalized.name.as_deref(), Some("RustGenerator"));
        assert_eq!(normalized.database.name.as_deref(), Some("postgresql"));
        assert_eq!(normalized.target.directory, PathBuf::from("/tmp/out"));
    }
}
