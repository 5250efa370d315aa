//! Tracking tables for applied changesets

use crate::executor::{ExecError, SqlExecutor};

/// Table recording applied changesets
pub const CHANGELOG_TABLE: &str = "databasechangelog";

/// Single-row table used as the changelog lock
pub const LOCK_TABLE: &str = "databasechangeloglock";

/// Width of the free-text columns (`description`, `comments`, `contexts`, `labels`)
pub(crate) const TEXT_COLUMN_WIDTH: usize = 255;

/// Create both tracking tables (and the lock row) if they don't exist
///
/// The column layout follows the conventional `databasechangelog` schema so
/// existing tooling can read it. `md5sum` holds `sha256:<hex>` checksums.
pub fn initialize_tracking_tables(executor: &dyn SqlExecutor) -> Result<(), ExecError> {
    let changelog_sql = r#"
        CREATE TABLE IF NOT EXISTS databasechangelog (
            id VARCHAR(255) NOT NULL,
            author VARCHAR(255) NOT NULL,
            filename VARCHAR(255) NOT NULL,
            dateexecuted TIMESTAMP NOT NULL,
            orderexecuted INTEGER NOT NULL,
            exectype VARCHAR(10) NOT NULL,
            md5sum VARCHAR(80),
            description VARCHAR(255),
            comments VARCHAR(255),
            tag VARCHAR(255),
            liquibase VARCHAR(20),
            contexts VARCHAR(255),
            labels VARCHAR(255),
            deployment_id VARCHAR(10)
        )
    "#;
    executor.execute(changelog_sql, &[])?;

    let lock_sql = r#"
        CREATE TABLE IF NOT EXISTS databasechangeloglock (
            id INTEGER PRIMARY KEY,
            locked BOOLEAN NOT NULL,
            lockgranted TIMESTAMP,
            lockedby VARCHAR(255)
        )
    "#;
    executor.execute(lock_sql, &[])?;

    executor.execute(
        "INSERT INTO databasechangeloglock (id, locked) VALUES (1, FALSE) ON CONFLICT (id) DO NOTHING",
        &[],
    )?;

    Ok(())
}
