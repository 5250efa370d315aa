//! Entry point tying introspection and emission together

use crate::config::{Configuration, POSTGRES_DRIVER};
use crate::database::{database_for, TableFilter};
use crate::error::{CodegenError, Result};
use crate::generator::generator_for;
use std::path::PathBuf;
use tidepool::{connect, MayPostgresExecutor, SqlExecutor};

/// What a generation run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub output_dir: PathBuf,
    /// Files written, table modules first and `mod.rs` last
    pub files: Vec<PathBuf>,
    pub table_count: usize,
}

pub struct GenerationTool;

impl GenerationTool {
    /// Connect to the configured database and generate sources
    ///
    /// Generator and database names must be set; see [`Self::generate_with`].
    pub fn generate(config: &Configuration) -> Result<GenerationReport> {
        let connection = config.connection.as_ref().ok_or(CodegenError::MissingConnection)?;
        if connection.driver != POSTGRES_DRIVER {
            return Err(CodegenError::UnsupportedDriver(connection.driver.clone()));
        }

        let executor = MayPostgresExecutor::new(connect(&connection.url)?);
        Self::generate_with(config, &executor)
    }

    /// Generate sources reading the schema through `executor`
    pub fn generate_with(config: &Configuration, executor: &dyn SqlExecutor) -> Result<GenerationReport> {
        let generator_config = &config.generator;
        let database_name = generator_config
            .database
            .name
            .as_deref()
            .ok_or(CodegenError::MissingName("database"))?;
        let generator_name = generator_config.name.as_deref().ok_or(CodegenError::MissingName("generator"))?;

        let database = database_for(database_name)?;
        let generator = generator_for(generator_name)?;
        let filter = TableFilter::from_settings(&generator_config.database)?;

        let schema = database.introspect(executor, &generator_config.database, &filter)?;
        log::info!(
            "Introspected {} tables from schema '{}' ({})",
            schema.tables.len(),
            schema.name,
            database.name()
        );

        let output_dir = generator_config.target.directory.clone();
        let files = generator.generate(&schema, generator_config, &output_dir)?;

        Ok(GenerationReport {
            output_dir,
            files,
            table_count: schema.tables.len(),
        })
    }
}
