//! Changelog loading
//!
//! XML (see [`crate::changelog::xml`]), YAML and JSON changelogs share one
//! document shape:
//!
//! ```yaml
//! databaseChangeLog:
//!   - changeSet:
//!       id: 1
//!       author: alice
//!       changes:
//!         - createTable:
//!             tableName: users
//!             columns:
//!               - column: { name: id, type: bigint, autoIncrement: true, constraints: { primaryKey: true } }
//!   - include:
//!       file: db/more.sql
//!   - includeAll:
//!       path: db/changes/
//! ```
//!
//! SQL files (see [`crate::changelog::formatted_sql`]) can be used as the root
//! changelog or included from any other one. A `.sql` file without the
//! `--liquibase formatted sql` header becomes a single raw changeset.

use crate::changelog::checksum::{calculate_checksum, normalize_sql};
use crate::changelog::formatted_sql::{self, split_list};
use crate::changelog::sql::quote_literal;
use crate::changelog::xml;
use crate::changelog::{Change, ChangeLog, ChangeSet, ChangelogError, ColumnSpec};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use yaml_rust::{Yaml, YamlLoader};

const CHANGELOG_EXTENSIONS: &[&str] = &["xml", "yaml", "yml", "json", "sql"];

/// Load a changelog and everything it includes
///
/// `changelog` is resolved against `project_root` when relative. Every file the
/// changelog references must resolve under `project_root`.
pub fn load_changelog(project_root: &Path, changelog: &Path) -> Result<ChangeLog, ChangelogError> {
    let root = canonical(project_root)?;
    let requested = if changelog.is_absolute() {
        changelog.to_path_buf()
    } else {
        root.join(changelog)
    };
    let root_file = canonical(&requested)?;
    ensure_under_root(&root, &root_file)?;

    let mut loader = Loader {
        root,
        stack: Vec::new(),
        seen: HashSet::new(),
        change_sets: Vec::new(),
        source_files: Vec::new(),
    };
    loader.load_file(&root_file)?;

    log::debug!(
        "Loaded {} changesets from {} files",
        loader.change_sets.len(),
        loader.source_files.len()
    );

    Ok(ChangeLog {
        root_file,
        change_sets: loader.change_sets,
        source_files: loader.source_files,
    })
}

fn canonical(path: &Path) -> Result<PathBuf, ChangelogError> {
    if !path.exists() {
        return Err(ChangelogError::FileNotFound(path.to_path_buf()));
    }
    fs::canonicalize(path).map_err(|source| ChangelogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_under_root(root: &Path, path: &Path) -> Result<(), ChangelogError> {
    if path.starts_with(root) {
        Ok(())
    } else {
        Err(ChangelogError::OutsideRoot {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })
    }
}

struct Loader {
    root: PathBuf,
    /// Files currently being loaded, for cycle detection
    stack: Vec<PathBuf>,
    seen: HashSet<(String, String, String)>,
    change_sets: Vec<ChangeSet>,
    source_files: Vec<PathBuf>,
}

impl Loader {
    fn load_file(&mut self, path: &Path) -> Result<(), ChangelogError> {
        if self.stack.iter().any(|p| p == path) {
            return Err(ChangelogError::IncludeCycle(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !CHANGELOG_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ChangelogError::UnsupportedFormat(path.to_path_buf()));
        }

        let text = self.read(path)?;
        log::debug!("Reading changelog {}", path.display());
        self.stack.push(path.to_path_buf());

        let result = match extension.as_str() {
            "sql" if formatted_sql::is_formatted_sql(&text) => {
                let file = self.relative_name(path);
                formatted_sql::parse(path, &file, &text).and_then(|change_sets| {
                    change_sets.into_iter().try_for_each(|cs| self.register(cs))
                })
            }
            "sql" => {
                log::debug!("{} has no formatted SQL header, loading it as one changeset", path.display());
                let file = self.relative_name(path);
                formatted_sql::raw_change_set(&file, &text).and_then(|cs| self.register(cs))
            }
            "xml" => xml::parse_document(path, &text).and_then(|doc| self.load_document(path, &doc)),
            "json" => serde_json::from_str::<Value>(&text)
                .map_err(|e| ChangelogError::parse(path, e.to_string()))
                .and_then(|doc| self.load_document(path, &doc)),
            _ => parse_yaml(path, &text).and_then(|doc| self.load_document(path, &doc)),
        };

        self.stack.pop();
        result
    }

    fn read(&mut self, path: &Path) -> Result<String, ChangelogError> {
        let text = fs::read_to_string(path).map_err(|source| ChangelogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !self.source_files.iter().any(|p| p == path) {
            self.source_files.push(path.to_path_buf());
        }
        Ok(text)
    }

    /// Project-relative, `/`-separated name used to identify changesets
    fn relative_name(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    fn register(&mut self, change_set: ChangeSet) -> Result<(), ChangelogError> {
        let key = (
            change_set.id.clone(),
            change_set.author.clone(),
            change_set.file.clone(),
        );
        if !self.seen.insert(key) {
            return Err(ChangelogError::DuplicateChangeSet {
                id: change_set.id,
                author: change_set.author,
                file: change_set.file,
            });
        }
        self.change_sets.push(change_set);
        Ok(())
    }

    /// Resolve a referenced path against the project root or the referencing file
    fn resolve(&self, current: &Path, reference: &str, relative_to_changelog: bool) -> Result<PathBuf, ChangelogError> {
        let base = if relative_to_changelog {
            current.parent().unwrap_or(&self.root).to_path_buf()
        } else {
            self.root.clone()
        };
        let reference = Path::new(reference);
        let candidate = if reference.is_absolute() {
            reference.to_path_buf()
        } else {
            base.join(reference)
        };
        let resolved = canonical(&candidate)?;
        ensure_under_root(&self.root, &resolved)?;
        Ok(resolved)
    }

    fn load_document(&mut self, path: &Path, doc: &Value) -> Result<(), ChangelogError> {
        let entries = match doc {
            Value::Object(map) => match map.get("databaseChangeLog") {
                Some(Value::Array(entries)) => entries.as_slice(),
                Some(Value::Null) => &[],
                Some(_) => return Err(ChangelogError::parse(path, "'databaseChangeLog' must be a list")),
                None => return Err(ChangelogError::parse(path, "missing top-level 'databaseChangeLog'")),
            },
            Value::Array(entries) => entries.as_slice(),
            Value::Null => &[],
            _ => return Err(ChangelogError::parse(path, "expected a 'databaseChangeLog' document")),
        };

        for entry in entries {
            let (kind, body) = single_entry(path, entry)?;
            match kind {
                "changeSet" => {
                    let change_set = self.parse_change_set(path, object(path, kind, body)?)?;
                    self.register(change_set)?;
                }
                "include" => {
                    let body = object(path, kind, body)?;
                    let file = required_str(path, body, "file", kind)?;
                    let relative = bool_attr(path, body, "relativeToChangelogFile", false)?;
                    let target = self.resolve(path, &file, relative)?;
                    self.load_file(&target)?;
                }
                "includeAll" => {
                    let body = object(path, kind, body)?;
                    self.include_all(path, body)?;
                }
                "property" | "preConditions" | "changeLogId" => {
                    log::warn!("{}: '{}' is not supported and was ignored", path.display(), kind);
                }
                other => {
                    return Err(ChangelogError::parse(
                        path,
                        format!("unknown changelog entry '{}'", other),
                    ))
                }
            }
        }
        Ok(())
    }

    fn include_all(&mut self, path: &Path, body: &Map<String, Value>) -> Result<(), ChangelogError> {
        let dir = required_str(path, body, "path", "includeAll")?;
        let relative = bool_attr(path, body, "relativeToChangelogFile", false)?;
        let error_if_empty = bool_attr(path, body, "errorIfMissingOrEmpty", true)?;

        let dir = match self.resolve(path, &dir, relative) {
            Ok(dir) => dir,
            Err(ChangelogError::FileNotFound(_)) if !error_if_empty => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut files = Vec::new();
        collect_changelog_files(&dir, &mut files)?;
        files.sort();

        if files.is_empty() && error_if_empty {
            return Err(ChangelogError::parse(
                path,
                format!("includeAll directory '{}' contains no changelogs", dir.display()),
            ));
        }
        for file in files {
            // Skip the including file itself when it lives in the same directory
            if self.stack.iter().any(|p| *p == file) {
                continue;
            }
            self.load_file(&file)?;
        }
        Ok(())
    }

    fn parse_change_set(&mut self, path: &Path, body: &Map<String, Value>) -> Result<ChangeSet, ChangelogError> {
        let id = required_str(path, body, "id", "changeSet")?;
        let author = required_str(path, body, "author", "changeSet")?;
        let context = |msg: String| ChangelogError::parse(path, format!("changeSet {}: {}", id, msg));

        let changes_value = body.get("changes").cloned().unwrap_or(Value::Array(Vec::new()));
        let Value::Array(raw_changes) = changes_value else {
            return Err(context("'changes' must be a list".to_string()));
        };

        let mut changes = Vec::with_capacity(raw_changes.len());
        for raw in &raw_changes {
            let (kind, change_body) = single_entry(path, raw)?;
            changes.push(self.parse_change(path, kind, change_body).map_err(|e| match e {
                ChangelogError::Parse { message, .. } => context(message),
                other => other,
            })?);
        }

        let checksum = calculate_checksum(&changes)?;

        Ok(ChangeSet {
            id: id.clone(),
            author,
            file: self.relative_name(path),
            changes,
            contexts: list_attr(body, &["contextFilter", "contexts", "context"]),
            labels: list_attr(body, &["labels"]),
            run_always: bool_attr(path, body, "runAlways", false)?,
            run_on_change: bool_attr(path, body, "runOnChange", false)?,
            fail_on_error: bool_attr(path, body, "failOnError", true)?,
            run_in_transaction: bool_attr(path, body, "runInTransaction", true)?,
            comment: string_attr(body, "comment"),
            checksum,
        })
    }

    fn parse_change(&mut self, path: &Path, kind: &str, body: &Value) -> Result<Change, ChangelogError> {
        // `- sql: SELECT 1` shorthand
        if let (Some(sql), "sql") = (body.as_str(), kind) {
            return Ok(Change::Sql {
                sql: normalize_sql(sql),
                split_statements: true,
                strip_comments: false,
            });
        }

        let body = object(path, kind, body)?;
        let split_statements = bool_attr(path, body, "splitStatements", true)?;
        let strip_comments = bool_attr(path, body, "stripComments", false)?;

        match kind {
            "sql" => Ok(Change::Sql {
                sql: normalize_sql(&required_str(path, body, "sql", kind)?),
                split_statements,
                strip_comments,
            }),
            "sqlFile" => {
                let reference = required_str(path, body, "path", kind)?;
                let relative = bool_attr(path, body, "relativeToChangelogFile", false)?;
                let file = self.resolve(path, &reference, relative)?;
                let sql = self.read(&file)?;
                Ok(Change::SqlFile {
                    path: self.relative_name(&file),
                    sql: normalize_sql(&sql),
                    split_statements,
                    strip_comments,
                })
            }
            "createTable" => Ok(Change::CreateTable {
                schema_name: string_attr(body, "schemaName"),
                table_name: required_str(path, body, "tableName", kind)?,
                remarks: string_attr(body, "remarks"),
                columns: parse_columns(path, body, kind)?,
            }),
            "addColumn" => Ok(Change::AddColumn {
                schema_name: string_attr(body, "schemaName"),
                table_name: required_str(path, body, "tableName", kind)?,
                columns: parse_columns(path, body, kind)?,
            }),
            "dropTable" => Ok(Change::DropTable {
                schema_name: string_attr(body, "schemaName"),
                table_name: required_str(path, body, "tableName", kind)?,
                cascade_constraints: bool_attr(path, body, "cascadeConstraints", false)?,
            }),
            "createIndex" => {
                let columns = column_entries(path, body, kind)?
                    .into_iter()
                    .map(|column| required_str(path, column, "name", "column"))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Change::CreateIndex {
                    schema_name: string_attr(body, "schemaName"),
                    table_name: required_str(path, body, "tableName", kind)?,
                    index_name: required_str(path, body, "indexName", kind)?,
                    unique: bool_attr(path, body, "unique", false)?,
                    columns,
                })
            }
            other => Err(ChangelogError::parse(
                path,
                format!(
                    "unsupported change type '{}' (supported: sql, sqlFile, createTable, addColumn, dropTable, createIndex)",
                    other
                ),
            )),
        }
    }
}

fn collect_changelog_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ChangelogError> {
    let entries = fs::read_dir(dir).map_err(|source| ChangelogError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ChangelogError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_changelog_files(&path, files)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| CHANGELOG_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn parse_columns(path: &Path, body: &Map<String, Value>, kind: &str) -> Result<Vec<ColumnSpec>, ChangelogError> {
    let columns = column_entries(path, body, kind)?
        .into_iter()
        .map(|column| parse_column(path, column))
        .collect::<Result<Vec<_>, _>>()?;
    if columns.is_empty() {
        return Err(ChangelogError::parse(path, format!("{} requires at least one column", kind)));
    }
    Ok(columns)
}

/// The `column` objects of a `columns: [{ column: {...} }]` list
fn column_entries<'a>(
    path: &Path,
    body: &'a Map<String, Value>,
    kind: &str,
) -> Result<Vec<&'a Map<String, Value>>, ChangelogError> {
    let Some(Value::Array(items)) = body.get("columns") else {
        return Err(ChangelogError::parse(path, format!("{} requires a 'columns' list", kind)));
    };
    items
        .iter()
        .map(|item| {
            let (entry_kind, column) = single_entry(path, item)?;
            if entry_kind != "column" {
                return Err(ChangelogError::parse(
                    path,
                    format!("expected 'column' in {} columns, found '{}'", kind, entry_kind),
                ));
            }
            object(path, entry_kind, column)
        })
        .collect()
}

fn parse_column(path: &Path, body: &Map<String, Value>) -> Result<ColumnSpec, ChangelogError> {
    let name = required_str(path, body, "name", "column")?;
    let data_type = required_str(path, body, "type", "column")?;
    let mut column = ColumnSpec::new(name, data_type);

    column.auto_increment = bool_attr(path, body, "autoIncrement", false)?;
    column.remarks = string_attr(body, "remarks");
    column.default_sql = default_value(body);

    if let Some(constraints) = body.get("constraints") {
        let constraints = object(path, "constraints", constraints)?;
        column.nullable = bool_attr(path, constraints, "nullable", true)?;
        column.primary_key = bool_attr(path, constraints, "primaryKey", false)?;
        column.unique = bool_attr(path, constraints, "unique", false)?;
    }
    Ok(column)
}

fn default_value(body: &Map<String, Value>) -> Option<String> {
    if let Some(value) = string_attr(body, "defaultValueComputed") {
        return Some(value);
    }
    if let Some(value) = body.get("defaultValueNumeric") {
        return scalar_to_string(value);
    }
    if let Some(value) = body.get("defaultValueBoolean") {
        return match value {
            Value::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            other => scalar_to_string(other).map(|s| s.to_uppercase()),
        };
    }
    string_attr(body, "defaultValueDate")
        .or_else(|| string_attr(body, "defaultValue"))
        .map(|value| quote_literal(&value))
}

/// An entry of the form `{ kind: body }`
fn single_entry<'a>(path: &Path, entry: &'a Value) -> Result<(&'a str, &'a Value), ChangelogError> {
    match entry {
        Value::Object(map) if map.len() == 1 => map
            .iter()
            .next()
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ChangelogError::parse(path, "empty entry")),
        _ => Err(ChangelogError::parse(
            path,
            format!("expected a single-key mapping, found {}", entry),
        )),
    }
}

fn object<'a>(path: &Path, kind: &str, value: &'a Value) -> Result<&'a Map<String, Value>, ChangelogError> {
    value
        .as_object()
        .ok_or_else(|| ChangelogError::parse(path, format!("'{}' must be a mapping", kind)))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_attr(body: &Map<String, Value>, key: &str) -> Option<String> {
    body.get(key).and_then(scalar_to_string)
}

fn required_str(path: &Path, body: &Map<String, Value>, key: &str, kind: &str) -> Result<String, ChangelogError> {
    string_attr(body, key)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ChangelogError::parse(path, format!("{} requires '{}'", kind, key)))
}

fn bool_attr(path: &Path, body: &Map<String, Value>, key: &str, default: bool) -> Result<bool, ChangelogError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => s
            .trim()
            .to_ascii_lowercase()
            .parse::<bool>()
            .map_err(|_| ChangelogError::parse(path, format!("'{}' expects true or false, got '{}'", key, s))),
        Some(other) => Err(ChangelogError::parse(
            path,
            format!("'{}' expects true or false, got {}", key, other),
        )),
    }
}

fn list_attr(body: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let Some(value) = keys.iter().find_map(|k| body.get(*k)) else {
        return Vec::new();
    };
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other).map(|s| split_list(&s)).unwrap_or_default(),
    }
}

fn parse_yaml(path: &Path, text: &str) -> Result<Value, ChangelogError> {
    let docs = YamlLoader::load_from_str(text).map_err(|e| ChangelogError::parse(path, e.to_string()))?;
    match docs.into_iter().next() {
        Some(doc) => yaml_to_json(path, doc),
        None => Ok(Value::Null),
    }
}

fn yaml_to_json(path: &Path, yaml: Yaml) -> Result<Value, ChangelogError> {
    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Boolean(b) => Value::Bool(b),
        Yaml::Integer(i) => Value::from(i),
        Yaml::Real(raw) => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(raw)),
        Yaml::String(s) => Value::String(s),
        Yaml::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| yaml_to_json(path, item))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Hash(hash) => {
            let mut map = Map::new();
            for (key, value) in hash {
                let key = match key {
                    Yaml::String(s) | Yaml::Real(s) => s,
                    Yaml::Integer(i) => i.to_string(),
                    Yaml::Boolean(b) => b.to_string(),
                    other => {
                        return Err(ChangelogError::parse(path, format!("unsupported mapping key {:?}", other)))
                    }
                };
                map.insert(key, yaml_to_json(path, value)?);
            }
            Value::Object(map)
        }
        Yaml::Alias(_) => return Err(ChangelogError::parse(path, "YAML aliases are not supported")),
        Yaml::BadValue => return Err(ChangelogError::parse(path, "invalid YAML value")),
    })
}
