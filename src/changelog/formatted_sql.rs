//! Formatted SQL changelogs
//!
//! ```sql
//! --liquibase formatted sql
//!
//! --changeset alice:1 context:dev runOnChange:true
//! --comment: create users
//! CREATE TABLE users (id INT PRIMARY KEY);
//! --rollback DROP TABLE users;
//! ```
//!
//! Every `--changeset author:id` line opens a changeset whose body runs up to
//! the next one. `--rollback` lines are not part of the body.
//!
//! A `.sql` changelog without the header is a raw script, loaded as one
//! changeset by [`raw_change_set`].

use crate::changelog::checksum::{calculate_checksum, normalize_sql};
use crate::changelog::{Change, ChangeSet, ChangelogError};
use regex::Regex;
use std::path::Path;

struct Patterns {
    changeset: Regex,
    attribute: Regex,
    comment: Regex,
    directive: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            changeset: Regex::new(r#"(?i)^\s*--\s*changeset\s+(?:"([^"]+)"|([^\s:]+)):(\S+)(.*)$"#)?,
            attribute: Regex::new(r"(\w+):(\S+)")?,
            comment: Regex::new(r"(?i)^\s*--\s*comment:\s*(.*)$")?,
            directive: Regex::new(r"(?i)^\s*--\s*(rollback|precondition\S*|validcheck\S*)\b")?,
        })
    }
}

fn is_header(line: &str) -> bool {
    let Some(rest) = line.trim().strip_prefix("--") else {
        return false;
    };
    let words: Vec<String> = rest.split_whitespace().map(str::to_ascii_lowercase).collect();
    words.len() >= 3 && words[..3] == ["liquibase", "formatted", "sql"]
}

/// Whether `text` starts with the formatted SQL header
pub fn is_formatted_sql(text: &str) -> bool {
    text.lines()
        .find(|line| !line.trim().is_empty())
        .is_some_and(is_header)
}

struct Draft {
    id: String,
    author: String,
    attributes: Vec<(String, String)>,
    comment: Option<String>,
    body: Vec<String>,
}

/// Parse a formatted SQL changelog
///
/// `file` is the project-relative name recorded on every changeset.
pub fn parse(path: &Path, file: &str, text: &str) -> Result<Vec<ChangeSet>, ChangelogError> {
    if !is_formatted_sql(text) {
        return Err(ChangelogError::parse(
            path,
            "formatted SQL changelogs must start with '--liquibase formatted sql'",
        ));
    }

    let patterns =
        Patterns::new().map_err(|e| ChangelogError::parse(path, format!("Invalid regex: {}", e)))?;
    let mut drafts: Vec<Draft> = Vec::new();
    let mut header_seen = false;

    for line in text.lines() {
        if !header_seen && is_header(line) {
            header_seen = true;
            continue;
        }

        if let Some(caps) = patterns.changeset.captures(line) {
            let author = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let rest = caps.get(4).map_or("", |m| m.as_str());
            let attributes = patterns
                .attribute
                .captures_iter(rest)
                .map(|a| (a[1].to_string(), a[2].to_string()))
                .collect();
            drafts.push(Draft {
                id: caps[3].to_string(),
                author,
                attributes,
                comment: None,
                body: Vec::new(),
            });
            continue;
        }

        let Some(current) = drafts.last_mut() else {
            if !line.trim().is_empty() && !line.trim_start().starts_with("--") {
                log::warn!("{}: ignoring SQL before the first --changeset: {}", path.display(), line.trim());
            }
            continue;
        };

        if let Some(caps) = patterns.comment.captures(line) {
            if current.comment.is_none() {
                current.comment = Some(caps[1].trim().to_string());
            }
            continue;
        }
        if let Some(caps) = patterns.directive.captures(line) {
            if !caps[1].eq_ignore_ascii_case("rollback") {
                log::warn!("{}: '{}' is not supported and was ignored", path.display(), line.trim());
            }
            continue;
        }
        current.body.push(line.to_string());
    }

    drafts.into_iter().map(|draft| finish(path, file, draft)).collect()
}

/// Author recorded on changesets built from raw SQL files
pub const RAW_AUTHOR: &str = "includeAll";

/// A `.sql` file without the formatted header, as a single changeset
///
/// The id is the file's project-relative name. Statements are split on
/// top-level semicolons.
pub fn raw_change_set(file: &str, text: &str) -> Result<ChangeSet, ChangelogError> {
    let changes = vec![Change::Sql {
        sql: normalize_sql(text),
        split_statements: true,
        strip_comments: false,
    }];
    let checksum = calculate_checksum(&changes)?;

    Ok(ChangeSet {
        id: file.to_string(),
        author: RAW_AUTHOR.to_string(),
        file: file.to_string(),
        changes,
        contexts: Vec::new(),
        labels: Vec::new(),
        run_always: false,
        run_on_change: false,
        fail_on_error: true,
        run_in_transaction: true,
        comment: None,
        checksum,
    })
}

fn finish(path: &Path, file: &str, draft: Draft) -> Result<ChangeSet, ChangelogError> {
    let mut run_always = false;
    let mut run_on_change = false;
    let mut fail_on_error = true;
    let mut run_in_transaction = true;
    let mut split_statements = true;
    let mut strip_comments = false;
    let mut contexts = Vec::new();
    let mut labels = Vec::new();

    for (name, value) in &draft.attributes {
        let flag = || {
            value.parse::<bool>().map_err(|_| {
                ChangelogError::parse(
                    path,
                    format!("changeset {}: '{}' expects true or false, got '{}'", draft.id, name, value),
                )
            })
        };
        match name.as_str() {
            "runAlways" => run_always = flag()?,
            "runOnChange" => run_on_change = flag()?,
            "failOnError" => fail_on_error = flag()?,
            "runInTransaction" => run_in_transaction = flag()?,
            "splitStatements" => split_statements = flag()?,
            "stripComments" => strip_comments = flag()?,
            "context" | "contexts" | "contextFilter" => contexts = split_list(value),
            "labels" => labels = split_list(value),
            other => log::debug!("{}: ignoring changeset attribute '{}'", path.display(), other),
        }
    }

    let changes = vec![Change::Sql {
        sql: normalize_sql(&draft.body.join("\n")),
        split_statements,
        strip_comments,
    }];
    let checksum = calculate_checksum(&changes)?;

    Ok(ChangeSet {
        id: draft.id,
        author: draft.author,
        file: file.to_string(),
        changes,
        contexts,
        labels,
        run_always,
        run_on_change,
        fail_on_error,
        run_in_transaction,
        comment: draft.comment,
        checksum,
    })
}

/// Split a comma-separated tag list
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
