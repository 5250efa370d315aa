//! Tidepool Codegen Library
//!
//! Generates typed Rust bindings from a live PostgreSQL schema. The main entry
//! point is [`GenerationTool`], which introspects the configured schema through
//! a [`Database`] and hands it to a [`SourceGenerator`] such as
//! [`RustGenerator`].

pub mod config;
pub mod database;
pub mod error;
pub mod generator;
pub mod naming;
pub mod schema;
pub mod tool;
pub mod type_mapping;
pub mod writer;

pub use config::{
    Configuration, ConnectionDescriptor, DatabaseSettings, GenerateOptions, Generator, Target, POSTGRES_DRIVER,
};
pub use database::{database_for, Database, PostgresDatabase, TableFilter};
pub use error::CodegenError;
pub use generator::{generator_for, SourceGenerator};
pub use schema::{ColumnInfo, SchemaInfo, TableInfo, TableKind};
pub use tool::{GenerationReport, GenerationTool};
pub use writer::RustGenerator;
