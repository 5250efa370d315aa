//! Tests for the Rust source writer and the generation tool
//!
//! Generated code is compared with whitespace removed so the assertions hold
//! whether or not `rustfmt` is installed.

use may_postgres::types::ToSql;
use may_postgres::Row;
use std::cell::RefCell;
use std::fs;
use tempfile::TempDir;
use tidepool::{ExecError, SqlExecutor};
use tidepool_codegen::{
    CodegenError, ColumnInfo, Configuration, GenerateOptions, GenerationTool, Generator, RustGenerator, SchemaInfo,
    SourceGenerator, TableInfo, TableKind,
};

fn squash(code: &str) -> String {
    code.split_whitespace().collect()
}

fn column(name: &str, ordinal: i32, udt: &str, nullable: bool) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        ordinal,
        udt_name: udt.to_string(),
        nullable,
        default: None,
        identity: false,
        comment: None,
    }
}

fn users_table() -> TableInfo {
    TableInfo {
        schema: "public".to_string(),
        name: "users".to_string(),
        kind: TableKind::Table,
        comment: None,
        columns: vec![column("id", 1, "int4", false), column("name", 2, "varchar", true)],
        primary_key: vec!["id".to_string()],
    }
}

fn schema() -> SchemaInfo {
    let mut audit = users_table();
    audit.name = "audit_log".to_string();
    audit.kind = TableKind::View;
    audit.primary_key.clear();
    audit.columns = vec![
        column("type", 1, "text", false),
        column("createdAt", 2, "timestamptz", false),
        column("tags", 3, "_text", true),
    ];
    SchemaInfo {
        name: "public".to_string(),
        tables: vec![audit, users_table()],
    }
}

#[test]
fn test_table_code_contains_record_and_columns() {
    let code = RustGenerator::new()
        .generate_table_code(&users_table(), &GenerateOptions::default())
        .unwrap();
    assert!(code.starts_with("// @generated by tidepool-codegen"));

    let code = squash(&code);
    assert!(code.contains(r#"pubconstTABLE_NAME:&str="users";"#));
    assert!(code.contains(r#"pubconstSCHEMA_NAME:&str="public";"#));
    assert!(code.contains("pubstructUsers{pubid:i32,pubname:Option<String>,}"));
    assert!(code.contains("pubenumColumn{Id,Name,}"));
    assert!(code.contains(r#"Column::Id=>"id","#));
    assert!(code.contains("pubconstPRIMARY_KEY:&[Column]=&[Column::Id"));
    assert!(code.contains("pubfnfrom_row(row:&may_postgres::Row)"));
    assert!(code.contains(r#"name:row.try_get("name")?"#));
    assert!(!code.contains("serde::Serialize"));
}

#[test]
fn test_options_toggle_from_row_and_serde() {
    let options = GenerateOptions {
        from_row: false,
        serde: true,
    };
    let mut table = users_table();
    table.columns.push(column("displayName", 3, "text", false));

    let code = squash(&RustGenerator::new().generate_table_code(&table, &options).unwrap());
    assert!(!code.contains("from_row"));
    assert!(code.contains("serde::Serialize,serde::Deserialize"));
    assert!(code.contains(r#"#[serde(rename="displayName")]pubdisplay_name:String,"#));
}

#[test]
fn test_identifiers_and_types() {
    let table = schema().tables.remove(0);
    let code = squash(&RustGenerator::new().generate_table_code(&table, &GenerateOptions::default()).unwrap());
    assert!(code.contains("pubstructAuditLog{"));
    assert!(code.contains("pubr#type:String,"));
    assert!(code.contains("pubcreated_at:chrono::DateTime<chrono::Utc>,"));
    assert!(code.contains("pubtags:Option<Vec<String>>,"));
    assert!(code.contains("pubconstPRIMARY_KEY:&[Column]=&[];"));
}

#[test]
fn test_generate_writes_modules_and_mod_rs() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("generated");

    let files = RustGenerator::new()
        .generate(&schema(), &Generator::default(), &out)
        .unwrap();
    assert_eq!(files, vec![out.join("audit_log.rs"), out.join("users.rs"), out.join("mod.rs")]);

    let mod_rs = squash(&fs::read_to_string(out.join("mod.rs")).unwrap());
    assert!(mod_rs.contains("pubmodaudit_log;pubuseaudit_log::AuditLog;"));
    assert!(mod_rs.contains("pubmodusers;pubuseusers::Users;"));
}

#[test]
fn test_generation_is_deterministic() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let generator = RustGenerator::new();
    generator.generate(&schema(), &Generator::default(), first.path()).unwrap();
    generator.generate(&schema(), &Generator::default(), second.path()).unwrap();

    for file in ["audit_log.rs", "users.rs", "mod.rs"] {
        assert_eq!(
            fs::read(first.path().join(file)).unwrap(),
            fs::read(second.path().join(file)).unwrap(),
            "{} differs between runs",
            file
        );
    }
}

#[test]
fn test_clean_removes_stale_sources_only() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("dropped_table.rs"), "// stale").unwrap();
    fs::write(temp_dir.path().join("notes.txt"), "keep").unwrap();

    RustGenerator::new()
        .generate(&schema(), &Generator::default(), temp_dir.path())
        .unwrap();
    assert!(!temp_dir.path().join("dropped_table.rs").exists());
    assert!(temp_dir.path().join("notes.txt").exists());

    let mut keep = Generator::default();
    keep.target.clean = false;
    fs::write(temp_dir.path().join("handwritten.rs"), "// mine").unwrap();
    RustGenerator::new().generate(&schema(), &keep, temp_dir.path()).unwrap();
    assert!(temp_dir.path().join("handwritten.rs").exists());
}

#[derive(Default)]
struct RecordingExecutor {
    queries: RefCell<Vec<String>>,
}

impl SqlExecutor for RecordingExecutor {
    fn execute(&self, query: &str, _params: &[&dyn ToSql]) -> Result<u64, ExecError> {
        Err(ExecError::Other(format!("unexpected execute: {}", query)))
    }

    fn query_one(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Row, ExecError> {
        Err(ExecError::Other(format!("unexpected query_one: {}", query)))
    }

    fn query_all(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Vec<Row>, ExecError> {
        self.queries.borrow_mut().push(query.to_string());
        Ok(Vec::new())
    }

    fn batch_execute(&self, script: &str) -> Result<(), ExecError> {
        Err(ExecError::Other(format!("unexpected batch_execute: {}", script)))
    }
}

fn named_configuration(directory: &std::path::Path) -> Configuration {
    let mut config = Configuration::default();
    config.generator.name = Some("tidepool_codegen::RustGenerator".to_string());
    config.generator.database.name = Some("Postgres".to_string());
    config.generator.target.directory = directory.to_path_buf();
    config
}

#[test]
fn test_generate_with_empty_schema_writes_mod_rs() {
    let temp_dir = TempDir::new().unwrap();
    let executor = RecordingExecutor::default();

    let report = GenerationTool::generate_with(&named_configuration(temp_dir.path()), &executor).unwrap();
    assert_eq!(report.table_count, 0);
    assert_eq!(report.files, vec![temp_dir.path().join("mod.rs")]);
    assert!(executor
        .queries
        .borrow()
        .iter()
        .any(|q| q.contains("information_schema.tables")));
}

#[test]
fn test_generate_with_requires_names() {
    let temp_dir = TempDir::new().unwrap();
    let executor = RecordingExecutor::default();

    let mut config = named_configuration(temp_dir.path());
    config.generator.name = None;
    assert!(matches!(
        GenerationTool::generate_with(&config, &executor),
        Err(CodegenError::MissingName("generator"))
    ));

    let mut config = named_configuration(temp_dir.path());
    config.generator.database.name = None;
    assert!(matches!(
        GenerationTool::generate_with(&config, &executor),
        Err(CodegenError::MissingName("database"))
    ));

    let mut config = named_configuration(temp_dir.path());
    config.generator.name = Some("kotlin".to_string());
    assert!(matches!(
        GenerationTool::generate_with(&config, &executor),
        Err(CodegenError::UnknownGenerator(_))
    ));
}
