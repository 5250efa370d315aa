//! XML changelogs
//!
//! ```xml
//! <databaseChangeLog>
//!   <changeSet id="1" author="alice" context="dev">
//!     <comment>create users</comment>
//!     <createTable tableName="users">
//!       <column name="id" type="bigint" autoIncrement="true">
//!         <constraints primaryKey="true"/>
//!       </column>
//!     </createTable>
//!     <sql splitStatements="false">INSERT INTO users DEFAULT VALUES;</sql>
//!   </changeSet>
//!   <include file="db/more.yaml"/>
//!   <includeAll path="db/changes/"/>
//! </databaseChangeLog>
//! ```
//!
//! The document is converted into the same tree a YAML or JSON changelog
//! produces: attributes become string fields, `<column>` children become the
//! `columns` list and the text of `<sql>` becomes its `sql` field. Namespaces
//! are ignored.

use crate::changelog::ChangelogError;
use roxmltree::{Document, Node};
use serde_json::{Map, Value};
use std::path::Path;

/// Changeset children that are not changes
const CHANGE_SET_METADATA: &[&str] = &["rollback", "preConditions", "validCheckSum"];

/// Parse an XML changelog into a `{ "databaseChangeLog": [...] }` document
pub fn parse_document(path: &Path, text: &str) -> Result<Value, ChangelogError> {
    let doc = Document::parse(text).map_err(|e| ChangelogError::parse(path, e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "databaseChangeLog" {
        return Err(ChangelogError::parse(
            path,
            format!("expected <databaseChangeLog>, found <{}>", root.tag_name().name()),
        ));
    }

    let entries = elements(root)
        .map(|node| match node.tag_name().name() {
            "changeSet" => entry(node, change_set(path, node)),
            _ => entry(node, attributes(node)),
        })
        .collect();

    let mut doc = Map::new();
    doc.insert("databaseChangeLog".to_string(), Value::Array(entries));
    Ok(Value::Object(doc))
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

/// `{ name: body }`, the single-key form every changelog entry takes
fn entry(node: Node, body: Map<String, Value>) -> Value {
    let mut map = Map::new();
    map.insert(node.tag_name().name().to_string(), Value::Object(body));
    Value::Object(map)
}

fn attributes(node: Node) -> Map<String, Value> {
    node.attributes()
        .map(|attr| (attr.name().to_string(), Value::String(attr.value().to_string())))
        .collect()
}

/// Direct text and CDATA content, child elements excluded
fn text(node: Node) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|child| child.text())
        .collect()
}

fn change_set(path: &Path, node: Node) -> Map<String, Value> {
    let mut body = attributes(node);
    let mut changes = Vec::new();

    for child in elements(node) {
        let name = child.tag_name().name();
        if name == "comment" {
            body.insert("comment".to_string(), Value::String(text(child).trim().to_string()));
        } else if CHANGE_SET_METADATA.contains(&name) {
            log::debug!("{}: ignoring <{}> in changeSet", path.display(), name);
        } else {
            changes.push(entry(child, change(path, child)));
        }
    }

    body.insert("changes".to_string(), Value::Array(changes));
    body
}

fn change(path: &Path, node: Node) -> Map<String, Value> {
    let mut body = attributes(node);
    let mut columns = Vec::new();

    for child in elements(node) {
        match child.tag_name().name() {
            "column" => columns.push(entry(child, column(child))),
            "comment" => {}
            other => log::debug!(
                "{}: ignoring <{}> in <{}>",
                path.display(),
                other,
                node.tag_name().name()
            ),
        }
    }

    if !columns.is_empty() {
        body.insert("columns".to_string(), Value::Array(columns));
    }
    if node.tag_name().name() == "sql" {
        body.insert("sql".to_string(), Value::String(text(node)));
    }
    body
}

fn column(node: Node) -> Map<String, Value> {
    let mut body = attributes(node);
    if let Some(constraints) = elements(node).find(|c| c.tag_name().name() == "constraints") {
        body.insert("constraints".to_string(), Value::Object(attributes(constraints)));
    }
    body
}
