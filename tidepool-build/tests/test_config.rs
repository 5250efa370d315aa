//! Loading build configuration from files, manifests and the environment

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tidepool_build::{BuildConfig, ConfigError, CONFIG_FILE};

const TIDEPOOL_TOML: &str = r#"
[changelog]
file = "db/changelog.yaml"

[database]
port = 0
startup_timeout_secs = 30

[database.server_config]
shared_buffers = "16MB"

[generator.database]
input_schema = "app"

[generator.target]
directory = "src/db"
module_name = "db"
"#;

const MANIFEST: &str = r#"
[package]
name = "app"
version = "0.1.0"
edition = "2021"

[package.metadata.tidepool.changelog]
file = "migrations/changelog.sql"

[package.metadata.tidepool.generator]
name = "rust"

[package.metadata.tidepool.generator.generate]
serde = true
"#;

#[test]
fn test_load_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(CONFIG_FILE);
    fs::write(&path, TIDEPOOL_TOML).unwrap();

    let config = BuildConfig::load(&path).unwrap();
    assert_eq!(config.changelog.file, PathBuf::from("db/changelog.yaml"));
    assert_eq!(config.changelog.lock_timeout_secs, 60);
    assert_eq!(config.database.port, Some(0));
    assert_eq!(config.database.startup_timeout_secs, Some(30));
    assert_eq!(
        config.database.server_config.get("shared_buffers").map(String::as_str),
        Some("16MB")
    );
    assert_eq!(config.generator.name, None);
    assert_eq!(config.generator.database.input_schema, "app");
    assert_eq!(config.generator.target.directory, PathBuf::from("src/db"));
    assert_eq!(config.generator.target.module_name, "db");
    assert!(config.generator.target.clean);
}

#[test]
fn test_discover_prefers_config_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join(CONFIG_FILE), TIDEPOOL_TOML).unwrap();
    fs::write(temp_dir.path().join("Cargo.toml"), MANIFEST).unwrap();

    let (config, source) = BuildConfig::discover(temp_dir.path()).unwrap();
    assert_eq!(source, temp_dir.path().join(CONFIG_FILE));
    assert_eq!(config.changelog.file, PathBuf::from("db/changelog.yaml"));
}

#[test]
fn test_discover_reads_manifest_metadata() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("Cargo.toml"), MANIFEST).unwrap();

    let (config, source) = BuildConfig::discover(temp_dir.path()).unwrap();
    assert_eq!(source, temp_dir.path().join("Cargo.toml"));
    assert_eq!(config.changelog.file, PathBuf::from("migrations/changelog.sql"));
    assert_eq!(config.generator.name.as_deref(), Some("rust"));
    assert!(config.generator.generate.serde);
    assert!(config.generator.generate.from_row);
    assert_eq!(config.generator.target.directory, PathBuf::from("src/generated"));
}

#[test]
fn test_manifest_without_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let manifest = temp_dir.path().join("Cargo.toml");
    fs::write(&manifest, "[package]\nname = \"app\"\nversion = \"0.1.0\"\n").unwrap();

    assert_eq!(BuildConfig::from_manifest(&manifest).unwrap(), None);
    assert!(matches!(
        BuildConfig::discover(temp_dir.path()),
        Err(ConfigError::NotFound { .. })
    ));
}

#[test]
fn test_missing_changelog_section_is_invalid() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(CONFIG_FILE);
    fs::write(&path, "[generator.target]\ndirectory = \"out\"\n").unwrap();

    assert!(matches!(BuildConfig::load(&path), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_broken_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let manifest = temp_dir.path().join("Cargo.toml");
    fs::write(&manifest, "[package\nname = ").unwrap();

    assert!(matches!(
        BuildConfig::from_manifest(&manifest),
        Err(ConfigError::Manifest { .. })
    ));
}

#[test]
fn test_environment_overrides_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(CONFIG_FILE);
    fs::write(&path, TIDEPOOL_TOML).unwrap();

    // Only this test reads generator.database.excludes
    std::env::set_var("TIDEPOOL__GENERATOR__DATABASE__EXCLUDES", "audit_.*");
    let config = BuildConfig::load(&path);
    std::env::remove_var("TIDEPOOL__GENERATOR__DATABASE__EXCLUDES");

    let config = config.unwrap();
    assert_eq!(config.generator.database.excludes, "audit_.*");
    assert_eq!(config.changelog.file, PathBuf::from("db/changelog.yaml"));
}
