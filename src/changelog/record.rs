//! `RanChangeSet` - rows of the `databasechangelog` table

use crate::executor::ExecError;
use chrono::{DateTime, NaiveDateTime, Utc};
use may_postgres::Row;
use std::fmt;

/// How a changeset was recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecType {
    Executed,
    Reran,
    /// Written by other tooling (`MARK_RAN`, `FAILED`, ...)
    Other(String),
}

impl ExecType {
    pub fn as_str(&self) -> &str {
        match self {
            ExecType::Executed => "EXECUTED",
            ExecType::Reran => "RERAN",
            ExecType::Other(value) => value,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "EXECUTED" => ExecType::Executed,
            "RERAN" => ExecType::Reran,
            other => ExecType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ExecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A changeset recorded as applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RanChangeSet {
    pub id: String,
    pub author: String,
    pub filename: String,
    pub date_executed: DateTime<Utc>,
    pub order_executed: i32,
    pub exec_type: ExecType,
    /// `None` for rows written without a checksum
    pub checksum: Option<String>,
    pub description: Option<String>,
    pub deployment_id: Option<String>,
}

/// Column list matching [`RanChangeSet::from_row`]
pub(crate) const RAN_CHANGE_SET_COLUMNS: &str =
    "id, author, filename, dateexecuted::text, orderexecuted, exectype, md5sum, description, deployment_id";

impl RanChangeSet {
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.id, &self.author, &self.filename)
    }

    /// Build from a row selected with [`RAN_CHANGE_SET_COLUMNS`]
    pub fn from_row(row: &Row) -> Result<Self, ExecError> {
        let decode = |column: &str, e: may_postgres::Error| {
            ExecError::Decode(format!("databasechangelog.{}: {}", column, e))
        };

        let date_text: String = row.try_get(3).map_err(|e| decode("dateexecuted", e))?;
        let exec_type: String = row.try_get(5).map_err(|e| decode("exectype", e))?;

        Ok(Self {
            id: row.try_get(0).map_err(|e| decode("id", e))?,
            author: row.try_get(1).map_err(|e| decode("author", e))?,
            filename: row.try_get(2).map_err(|e| decode("filename", e))?,
            date_executed: parse_timestamp(&date_text)?,
            order_executed: row.try_get(4).map_err(|e| decode("orderexecuted", e))?,
            exec_type: ExecType::parse(&exec_type),
            checksum: row.try_get(6).map_err(|e| decode("md5sum", e))?,
            description: row.try_get(7).map_err(|e| decode("description", e))?,
            deployment_id: row.try_get(8).map_err(|e| decode("deployment_id", e))?,
        })
    }
}

/// Parse PostgreSQL's text rendering of a `TIMESTAMP`
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ExecError> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ExecError::Decode(format!("Failed to parse timestamp '{}': unrecognized format", value)))
}
