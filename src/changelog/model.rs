//! In-memory changelog representation

use crate::changelog::state_table::TEXT_COLUMN_WIDTH;
use serde::Serialize;
use std::path::PathBuf;

/// A fully loaded changelog, includes already expanded
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLog {
    /// Absolute path of the root changelog file
    pub root_file: PathBuf,
    /// Changesets in execution order
    pub change_sets: Vec<ChangeSet>,
    /// Every file read while loading (changelogs, includes, sql files)
    pub source_files: Vec<PathBuf>,
}

/// One unit of schema change, identified by `id`, `author` and `file`
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    pub id: String,
    pub author: String,
    /// Path of the declaring file relative to the project root, `/`-separated
    pub file: String,
    pub changes: Vec<Change>,
    pub contexts: Vec<String>,
    pub labels: Vec<String>,
    pub run_always: bool,
    pub run_on_change: bool,
    pub fail_on_error: bool,
    pub run_in_transaction: bool,
    pub comment: Option<String>,
    /// `sha256:<hex>` over the canonical form of `changes`
    pub checksum: String,
}

impl ChangeSet {
    /// `file::id::author`, the form used in log lines and errors
    pub fn display_id(&self) -> String {
        format!("{}::{}::{}", self.file, self.id, self.author)
    }

    /// Short description stored in the tracking table
    pub fn description(&self) -> String {
        let description = self
            .changes
            .iter()
            .map(Change::description)
            .collect::<Vec<_>>()
            .join("; ");
        truncate(&description, TEXT_COLUMN_WIDTH)
    }

    /// Whether this changeset is selected by the given filters
    pub fn is_selected(&self, contexts: &TagFilter, labels: &TagFilter) -> bool {
        contexts.matches(&self.contexts) && labels.matches(&self.labels)
    }
}

/// A single change inside a changeset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Change {
    #[serde(rename_all = "camelCase")]
    Sql {
        sql: String,
        split_statements: bool,
        strip_comments: bool,
    },
    #[serde(rename_all = "camelCase")]
    SqlFile {
        path: String,
        sql: String,
        split_statements: bool,
        strip_comments: bool,
    },
    #[serde(rename_all = "camelCase")]
    CreateTable {
        schema_name: Option<String>,
        table_name: String,
        remarks: Option<String>,
        columns: Vec<ColumnSpec>,
    },
    #[serde(rename_all = "camelCase")]
    AddColumn {
        schema_name: Option<String>,
        table_name: String,
        columns: Vec<ColumnSpec>,
    },
    #[serde(rename_all = "camelCase")]
    DropTable {
        schema_name: Option<String>,
        table_name: String,
        cascade_constraints: bool,
    },
    #[serde(rename_all = "camelCase")]
    CreateIndex {
        schema_name: Option<String>,
        table_name: String,
        index_name: String,
        unique: bool,
        columns: Vec<String>,
    },
}

impl Change {
    pub fn description(&self) -> String {
        match self {
            Change::Sql { .. } => "sql".to_string(),
            Change::SqlFile { path, .. } => format!("sqlFile path={}", path),
            Change::CreateTable { table_name, .. } => format!("createTable tableName={}", table_name),
            Change::AddColumn { table_name, .. } => format!("addColumn tableName={}", table_name),
            Change::DropTable { table_name, .. } => format!("dropTable tableName={}", table_name),
            Change::CreateIndex {
                index_name,
                table_name,
                ..
            } => format!("createIndex indexName={}, tableName={}", index_name, table_name),
        }
    }
}

/// Column definition used by `createTable` and `addColumn`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub auto_increment: bool,
    /// Rendered SQL default (already quoted when it is a literal)
    pub default_sql: Option<String>,
    pub remarks: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            primary_key: false,
            unique: false,
            auto_increment: false,
            default_sql: None,
            remarks: None,
        }
    }
}

/// Context or label filter applied when selecting changesets
///
/// An empty filter selects everything. A changeset without tags is always
/// selected. Otherwise a changeset is selected when any of its tags matches:
/// `name` matches when the filter contains it, `!name` when it does not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    tags: Vec<String>,
}

impl TagFilter {
    /// Filter that selects every changeset
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tags: tags
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn matches(&self, change_set_tags: &[String]) -> bool {
        if self.tags.is_empty() || change_set_tags.is_empty() {
            return true;
        }
        change_set_tags.iter().any(|tag| {
            let tag = tag.trim().to_lowercase();
            match tag.strip_prefix('!') {
                Some(negated) => !self.tags.iter().any(|t| t == negated.trim()),
                None => self.tags.iter().any(|t| *t == tag),
            }
        })
    }
}

/// Cut `value` to `max_chars` characters, ending in `...` when shortened
pub(crate) fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max_chars - 3).collect();
    truncated.push_str("...");
    truncated
}
