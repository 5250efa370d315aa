//! Tests for the build script helper

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tidepool_build::build_script::{generate_for_project, rerun_directives, skip_requested};
use tidepool_build::{BuildConfig, BuildError, ConfigError, CONFIG_FILE};

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_skip_values() {
    assert!(skip_requested(Some("1")));
    assert!(skip_requested(Some("true")));
    assert!(skip_requested(Some(" TRUE ")));
    assert!(!skip_requested(Some("0")));
    assert!(!skip_requested(Some("")));
    assert!(!skip_requested(None));
}

#[test]
fn test_rerun_directives_cover_every_changelog_file() {
    let temp_dir = TempDir::new().unwrap();
    let root = fs::canonicalize(temp_dir.path()).unwrap();
    write(&root, CONFIG_FILE, "[changelog]\nfile = \"db/changelog.yaml\"\n");
    write(
        &root,
        "db/changelog.yaml",
        "databaseChangeLog:\n  - include:\n      file: tables.sql\n      relativeToChangelogFile: true\n",
    );
    write(
        &root,
        "db/tables.sql",
        "--liquibase formatted sql\n--changeset dev:1\nCREATE TABLE users (id INT);\n",
    );

    let (config, source) = BuildConfig::discover(&root).unwrap();
    let directives = rerun_directives(&root, &config, &source);

    assert_eq!(
        directives,
        vec![
            format!("cargo:rerun-if-changed={}", root.join(CONFIG_FILE).display()),
            format!("cargo:rerun-if-changed={}", root.join("db/changelog.yaml").display()),
            format!("cargo:rerun-if-changed={}", root.join("db/tables.sql").display()),
        ]
    );
}

#[test]
fn test_rerun_directives_with_unloadable_changelog() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, CONFIG_FILE, "[changelog]\nfile = \"db/missing.yaml\"\n");

    let (config, source) = BuildConfig::discover(root).unwrap();
    let directives = rerun_directives(root, &config, &source);
    assert_eq!(directives.len(), 2);
    assert!(directives[1].ends_with("missing.yaml"));
}

#[test]
fn test_generate_without_configuration() {
    let temp_dir = TempDir::new().unwrap();
    let err = generate_for_project(temp_dir.path()).unwrap_err();
    assert!(matches!(err, BuildError::Config(ConfigError::NotFound { .. })));
}
