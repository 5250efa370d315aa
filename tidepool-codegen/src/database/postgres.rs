//! `information_schema` introspection for PostgreSQL

use crate::config::DatabaseSettings;
use crate::database::{Database, TableFilter};
use crate::error::Result;
use crate::schema::{ColumnInfo, SchemaInfo, TableInfo, TableKind};
use may_postgres::Row;
use std::collections::BTreeMap;
use tidepool::{ExecError, SqlExecutor};

/// PostgreSQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDatabase;

const TABLES_SQL: &str = r#"
    SELECT t.table_name::text,
           t.table_type::text,
           obj_description(format('%I.%I', t.table_schema, t.table_name)::regclass, 'pg_class')::text
    FROM information_schema.tables t
    WHERE t.table_schema = $1::text
      AND t.table_type IN ('BASE TABLE', 'VIEW')
    ORDER BY t.table_name
"#;

const COLUMNS_SQL: &str = r#"
    SELECT c.table_name::text,
           c.column_name::text,
           c.ordinal_position::int4,
           c.udt_name::text,
           (c.is_nullable = 'YES'),
           c.column_default::text,
           (c.is_identity = 'YES'),
           col_description(format('%I.%I', c.table_schema, c.table_name)::regclass, c.ordinal_position::int4)::text
    FROM information_schema.columns c
    WHERE c.table_schema = $1::text
    ORDER BY c.table_name, c.ordinal_position
"#;

const PRIMARY_KEYS_SQL: &str = r#"
    SELECT kcu.table_name::text, kcu.column_name::text
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON tc.constraint_name = kcu.constraint_name
     AND tc.table_schema = kcu.table_schema
     AND tc.table_name = kcu.table_name
    WHERE tc.constraint_type = 'PRIMARY KEY'
      AND tc.table_schema = $1::text
    ORDER BY kcu.table_name, kcu.ordinal_position
"#;

/// A table row before columns are attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawTable {
    pub name: String,
    pub kind: TableKind,
    pub comment: Option<String>,
}

impl Database for PostgresDatabase {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn introspect(
        &self,
        executor: &dyn SqlExecutor,
        settings: &DatabaseSettings,
        filter: &TableFilter,
    ) -> Result<SchemaInfo> {
        let schema = settings.input_schema.as_str();
        log::debug!("Introspecting schema '{}'", schema);

        let tables = executor
            .query_all(TABLES_SQL, &[&schema])?
            .iter()
            .map(raw_table)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let columns = executor
            .query_all(COLUMNS_SQL, &[&schema])?
            .iter()
            .map(raw_column)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let primary_keys = executor
            .query_all(PRIMARY_KEYS_SQL, &[&schema])?
            .iter()
            .map(|row| Ok((text(row, 0)?, text(row, 1)?)))
            .collect::<std::result::Result<Vec<_>, ExecError>>()?;

        Ok(assemble(schema, tables, columns, primary_keys, filter))
    }
}

fn decode(column: usize, e: may_postgres::Error) -> ExecError {
    ExecError::Decode(format!("column {}: {}", column, e))
}

fn text(row: &Row, idx: usize) -> std::result::Result<String, ExecError> {
    row.try_get(idx).map_err(|e| decode(idx, e))
}

fn optional_text(row: &Row, idx: usize) -> std::result::Result<Option<String>, ExecError> {
    row.try_get(idx).map_err(|e| decode(idx, e))
}

fn raw_table(row: &Row) -> std::result::Result<RawTable, ExecError> {
    let kind = match text(row, 1)?.as_str() {
        "VIEW" => TableKind::View,
        _ => TableKind::Table,
    };
    Ok(RawTable {
        name: text(row, 0)?,
        kind,
        comment: optional_text(row, 2)?,
    })
}

fn raw_column(row: &Row) -> std::result::Result<(String, ColumnInfo), ExecError> {
    let table = text(row, 0)?;
    let column = ColumnInfo {
        name: text(row, 1)?,
        ordinal: row.try_get(2).map_err(|e| decode(2, e))?,
        udt_name: text(row, 3)?,
        nullable: row.try_get(4).map_err(|e| decode(4, e))?,
        default: optional_text(row, 5)?,
        identity: row.try_get(6).map_err(|e| decode(6, e))?,
        comment: optional_text(row, 7)?,
    };
    Ok((table, column))
}

/// Join table, column and key rows into a filtered, name-ordered schema
pub(crate) fn assemble(
    schema: &str,
    tables: Vec<RawTable>,
    columns: Vec<(String, ColumnInfo)>,
    primary_keys: Vec<(String, String)>,
    filter: &TableFilter,
) -> SchemaInfo {
    let mut by_name: BTreeMap<String, TableInfo> = tables
        .into_iter()
        .filter(|t| filter.matches(&t.name))
        .map(|t| {
            let info = TableInfo {
                schema: schema.to_string(),
                name: t.name.clone(),
                kind: t.kind,
                comment: t.comment,
                columns: Vec::new(),
                primary_key: Vec::new(),
            };
            (t.name, info)
        })
        .collect();

    for (table, column) in columns {
        if let Some(info) = by_name.get_mut(&table) {
            info.columns.push(column);
        }
    }
    for (table, column) in primary_keys {
        if let Some(info) = by_name.get_mut(&table) {
            info.primary_key.push(column);
        }
    }

    let tables = by_name
        .into_values()
        .map(|mut table| {
            table.columns.sort_by_key(|c| c.ordinal);
            table
        })
        .collect();

    SchemaInfo {
        name: schema.to_string(),
        tables,
    }
}
