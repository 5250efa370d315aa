//! Build step configuration
//!
//! A [`BuildConfig`] is read from `tidepool.toml` in the project root or, when
//! that file is absent, from `[package.metadata.tidepool]` in `Cargo.toml`.
//! Either way `TIDEPOOL__*` environment variables are layered on top, with `__`
//! separating nested keys (`TIDEPOOL__CHANGELOG__FILE=db/changelog.yaml`).
//!
//! ```toml
//! [changelog]
//! file = "db/changelog.yaml"
//!
//! [database]
//! port = 0
//!
//! [generator.target]
//! directory = "src/generated"
//! ```

use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tidepool::changelog::DEFAULT_LOCK_TIMEOUT;
use tidepool::EmbeddedSettings;
use tidepool_codegen::Generator;

/// Configuration file looked up in the project root
pub const CONFIG_FILE: &str = "tidepool.toml";
/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "TIDEPOOL";

const MANIFEST_FILE: &str = "Cargo.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BuildConfig {
    pub changelog: ChangelogSettings,
    #[serde(default)]
    pub database: DatabaseOptions,
    #[serde(default)]
    pub generator: Generator,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangelogSettings {
    /// Root changelog, relative to the project root
    pub file: PathBuf,
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

impl ChangelogSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

fn default_lock_timeout_secs() -> u64 {
    DEFAULT_LOCK_TIMEOUT.as_secs()
}

/// Overrides for the embedded server
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DatabaseOptions {
    /// Directory holding `initdb` and `pg_ctl`
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,
    /// Fixed port; absent or 0 picks a free one
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub startup_timeout_secs: Option<u64>,
    /// Extra server settings, merged over the defaults
    #[serde(default)]
    pub server_config: BTreeMap<String, String>,
}

impl DatabaseOptions {
    pub fn embedded_settings(&self) -> EmbeddedSettings {
        let mut settings = EmbeddedSettings::default();
        if let Some(dir) = &self.bin_dir {
            settings.bin_dir = Some(dir.clone());
        }
        settings.port = self.port.filter(|port| *port != 0);
        if let Some(secs) = self.startup_timeout_secs {
            settings.startup_timeout = Duration::from_secs(secs);
        }
        settings
            .server_config
            .extend(self.server_config.iter().map(|(k, v)| (k.clone(), v.clone())));
        settings
    }
}

impl BuildConfig {
    /// Load a TOML configuration file, applying environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(path, &content)
    }

    /// Read `[package.metadata.tidepool]` from a Cargo manifest
    ///
    /// Returns `Ok(None)` when the manifest has no such table.
    pub fn from_manifest(manifest: &Path) -> Result<Option<Self>, ConfigError> {
        let content = fs::read_to_string(manifest).map_err(|source| ConfigError::Io {
            path: manifest.to_path_buf(),
            source,
        })?;
        let document: toml::Table = toml::from_str(&content).map_err(|source| ConfigError::Manifest {
            path: manifest.to_path_buf(),
            source,
        })?;

        let Some(metadata) = document
            .get("package")
            .and_then(|package| package.get("metadata"))
            .and_then(|metadata| metadata.get("tidepool"))
        else {
            return Ok(None);
        };

        // Re-rendered so the table goes through the same layered loading as a config file
        let rendered = toml::to_string(metadata).map_err(|e| ConfigError::Invalid {
            path: manifest.to_path_buf(),
            source: config::ConfigError::Message(e.to_string()),
        })?;
        Self::from_toml_str(manifest, &rendered).map(Some)
    }

    /// Find the configuration for a project
    ///
    /// Returns the configuration and the file it came from.
    pub fn discover(project_root: &Path) -> Result<(Self, PathBuf), ConfigError> {
        let file = project_root.join(CONFIG_FILE);
        if file.is_file() {
            return Ok((Self::load(&file)?, file));
        }

        let manifest = project_root.join(MANIFEST_FILE);
        if manifest.is_file() {
            if let Some(config) = Self::from_manifest(&manifest)? {
                return Ok((config, manifest));
            }
        }

        Err(ConfigError::NotFound {
            root: project_root.to_path_buf(),
        })
    }

    fn from_toml_str(origin: &Path, content: &str) -> Result<Self, ConfigError> {
        let invalid = |source| ConfigError::Invalid {
            path: origin.to_path_buf(),
            source,
        };

        Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
            .build()
            .map_err(invalid)?
            .try_deserialize()
            .map_err(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_settings_from_defaults() {
        let settings = DatabaseOptions::default().embedded_settings();
        assert_eq!(settings, EmbeddedSettings::default());
    }

    #[test]
    fn test_embedded_settings_overrides() {
        let mut options = DatabaseOptions {
            bin_dir: Some(PathBuf::from("/opt/pg/bin")),
            port: Some(0),
            startup_timeout_secs: Some(5),
            server_config: BTreeMap::new(),
        };
        options.server_config.insert("fsync".to_string(), "on".to_string());
        options.server_config.insert("shared_buffers".to_string(), "16MB".to_string());

        let settings = options.embedded_settings();
        assert_eq!(settings.bin_dir, Some(PathBuf::from("/opt/pg/bin")));
        assert_eq!(settings.port, None);
        assert_eq!(settings.startup_timeout, Duration::from_secs(5));
        assert_eq!(settings.server_config.get("fsync").map(String::as_str), Some("on"));
        assert_eq!(settings.server_config.get("shared_buffers").map(String::as_str), Some("16MB"));
        assert_eq!(settings.server_config.get("max_connections").map(String::as_str), Some("300"));
    }
}
