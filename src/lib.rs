//! # Tidepool
//!
//! Building blocks for build-time schema tooling on PostgreSQL:
//!
//! - [`embedded`]: disposable PostgreSQL servers driven through `initdb` / `pg_ctl`
//! - [`connection`] and [`executor`]: blocking access over `may_postgres`
//! - [`changelog`]: a Liquibase-style changelog engine (YAML, JSON and formatted SQL)
//!
//! The `tidepool-codegen` crate turns a live schema into Rust sources and
//! `tidepool-build` sequences everything into a single build step.

pub mod changelog;
pub mod connection;
pub mod embedded;
pub mod executor;

pub use connection::{connect, postgres_url, ConnectionError};
pub use embedded::{Credentials, EmbeddedError, EmbeddedPostgres, EmbeddedSettings};
pub use executor::{ExecError, MayPostgresExecutor, SqlExecutor};
