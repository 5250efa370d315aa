//! Liquibase-style changelog engine
//!
//! A changelog is an XML, YAML, JSON or SQL file listing changesets.
//! [`load_changelog`] reads it (following `include` / `includeAll`), and a
//! [`Migrator`] applies the changesets that have not run yet, recording each
//! one in the `databasechangelog` table under the `databasechangeloglock` lock.
//!
//! Applied changesets are identified by `id`, `author` and the declaring
//! file's project-relative path. Editing an applied changeset is an error
//! unless it is marked `runOnChange`.

pub mod checksum;
pub mod error;
pub mod formatted_sql;
pub mod lock;
pub mod migrator;
pub mod model;
pub mod parser;
pub mod plan;
pub mod record;
pub mod sql;
pub mod state_table;
pub mod status;
pub mod xml;

pub use checksum::calculate_checksum;
pub use error::ChangelogError;
pub use lock::ChangelogLockGuard;
pub use migrator::{query_ran_change_sets, Migrator, UpdateSummary, DEFAULT_LOCK_TIMEOUT};
pub use model::{Change, ChangeLog, ChangeSet, ColumnSpec, TagFilter};
pub use parser::load_changelog;
pub use plan::{plan_update, PlannedAction, PlannedChangeSet};
pub use record::{ExecType, RanChangeSet};
pub use state_table::{initialize_tracking_tables, CHANGELOG_TABLE, LOCK_TABLE};
pub use status::{ChangelogStatus, PendingChangeSet};
