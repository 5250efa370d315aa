//! Database dialects that can be introspected

mod postgres;

pub use postgres::PostgresDatabase;

use crate::config::DatabaseSettings;
use crate::error::{CodegenError, Result};
use crate::schema::SchemaInfo;
use regex::Regex;
use tidepool::changelog::{CHANGELOG_TABLE, LOCK_TABLE};
use tidepool::SqlExecutor;

/// A database dialect the generator can read a schema from
pub trait Database {
    /// Short name used in configuration, e.g. `postgres`
    fn name(&self) -> &'static str;

    /// Read the tables of `settings.input_schema` that pass `filter`
    fn introspect(
        &self,
        executor: &dyn SqlExecutor,
        settings: &DatabaseSettings,
        filter: &TableFilter,
    ) -> Result<SchemaInfo>;
}

/// Resolve a dialect by name
///
/// Matching ignores case and accepts the short name, the type name and the
/// crate-qualified type name.
pub fn database_for(name: &str) -> Result<Box<dyn Database>> {
    match normalize_name(name).as_str() {
        "postgres" | "postgresql" | "postgresdatabase" | "tidepool_codegen::postgresdatabase"
        | "tidepool_codegen::database::postgresdatabase" => Ok(Box::new(PostgresDatabase)),
        _ => Err(CodegenError::UnknownDatabase(name.to_string())),
    }
}

pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Include/exclude filter over table names
///
/// Patterns must match the whole name. The changelog tracking tables are
/// always excluded.
#[derive(Debug, Clone)]
pub struct TableFilter {
    includes: Regex,
    excludes: Option<Regex>,
}

impl TableFilter {
    pub fn new(includes: &str, excludes: &str) -> Result<Self> {
        let includes = if includes.trim().is_empty() { ".*" } else { includes };
        let includes = anchored(includes).map_err(|source| CodegenError::InvalidPattern {
            kind: "includes",
            pattern: includes.to_string(),
            source,
        })?;
        let excludes = if excludes.trim().is_empty() {
            None
        } else {
            Some(anchored(excludes).map_err(|source| CodegenError::InvalidPattern {
                kind: "excludes",
                pattern: excludes.to_string(),
                source,
            })?)
        };
        Ok(Self { includes, excludes })
    }

    pub fn from_settings(settings: &DatabaseSettings) -> Result<Self> {
        Self::new(&settings.includes, &settings.excludes)
    }

    pub fn matches(&self, table: &str) -> bool {
        if table == CHANGELOG_TABLE || table == LOCK_TABLE {
            return false;
        }
        self.includes.is_match(table) && !self.excludes.as_ref().is_some_and(|re| re.is_match(table))
    }
}

fn anchored(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults_include_everything_but_tracking_tables() {
        let filter = TableFilter::new(".*", "").unwrap();
        assert!(filter.matches("users"));
        assert!(!filter.matches("databasechangelog"));
        assert!(!filter.matches("databasechangeloglock"));
    }

    #[test]
    fn test_filter_patterns_match_whole_name() {
        let filter = TableFilter::new("user.*|orders", "user_audit").unwrap();
        assert!(filter.matches("users"));
        assert!(filter.matches("orders"));
        assert!(!filter.matches("user_audit"));
        assert!(!filter.matches("old_orders"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = TableFilter::new("(", "").unwrap_err();
        assert!(matches!(err, CodegenError::InvalidPattern { kind: "includes", .. }));
    }

    #[test]
    fn test_database_names() {
        for name in ["postgres", "Postgres", "PostgresDatabase", "tidepool_codegen::PostgresDatabase"] {
            assert_eq!(database_for(name).unwrap().name(), "postgres");
        }
        assert!(matches!(database_for("oracle"), Err(CodegenError::UnknownDatabase(_))));
    }
}
