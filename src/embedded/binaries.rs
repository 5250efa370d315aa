//! Locating `initdb` and `pg_ctl`

use crate::embedded::EmbeddedError;
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable pointing at a PostgreSQL `bin` directory
pub const BIN_DIR_ENV: &str = "TIDEPOOL_PG_BIN";

/// Resolved server utilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgBinaries {
    pub initdb: PathBuf,
    pub pg_ctl: PathBuf,
}

impl PgBinaries {
    /// Resolve the utilities
    ///
    /// Search order:
    /// 1. the configured directory
    /// 2. `$TIDEPOOL_PG_BIN`
    /// 3. `PATH`
    /// 4. `pg_config --bindir`
    /// 5. `/usr/lib/postgresql/<version>/bin`, newest version first (Debian layout)
    ///
    /// An explicitly configured or environment-provided directory is authoritative:
    /// if the utilities are missing there, the search stops with an error.
    pub fn locate(configured: Option<&Path>) -> Result<Self, EmbeddedError> {
        if let Some(dir) = configured {
            return Self::in_dir(dir);
        }
        if let Some(dir) = env::var_os(BIN_DIR_ENV) {
            return Self::in_dir(Path::new(&dir));
        }

        let mut searched = vec!["PATH".to_string()];
        if let (Some(initdb), Some(pg_ctl)) = (find_on_path("initdb"), find_on_path("pg_ctl")) {
            return Ok(Self { initdb, pg_ctl });
        }

        searched.push("pg_config --bindir".to_string());
        if let Some(dir) = pg_config_bindir() {
            if let Ok(found) = Self::in_dir(&dir) {
                return Ok(found);
            }
        }

        for dir in distribution_bin_dirs() {
            searched.push(dir.display().to_string());
            if let Ok(found) = Self::in_dir(&dir) {
                return Ok(found);
            }
        }

        Err(EmbeddedError::BinaryNotFound {
            binary: "initdb".to_string(),
            searched: searched.join(", "),
        })
    }

    /// Resolve both utilities inside one directory
    pub fn in_dir(dir: &Path) -> Result<Self, EmbeddedError> {
        let missing = |binary: &str| EmbeddedError::BinaryNotFound {
            binary: binary.to_string(),
            searched: dir.display().to_string(),
        };
        let initdb = find_in_dir(dir, "initdb").ok_or_else(|| missing("initdb"))?;
        let pg_ctl = find_in_dir(dir, "pg_ctl").ok_or_else(|| missing("pg_ctl"))?;
        Ok(Self { initdb, pg_ctl })
    }
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    let candidate = dir.join(executable_name(name));
    candidate.is_file().then_some(candidate)
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    find_in_search_path(name, env::var_os("PATH"))
}

/// Executable lookup over a `PATH`-style list of directories
fn find_in_search_path<P: AsRef<OsStr>>(name: &str, paths: Option<P>) -> Option<PathBuf> {
    let cwd = env::current_dir().ok()?;
    match which::which_in(name, paths, cwd) {
        Ok(path) => Some(path),
        Err(e) => {
            log::trace!("{} not found on the search path: {}", name, e);
            None
        }
    }
}

fn pg_config_bindir() -> Option<PathBuf> {
    let pg_config = find_on_path("pg_config")?;
    let output = Command::new(pg_config).arg("--bindir").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let dir = String::from_utf8(output.stdout).ok()?;
    let dir = dir.trim();
    (!dir.is_empty()).then(|| PathBuf::from(dir))
}

fn distribution_bin_dirs() -> Vec<PathBuf> {
    let root = Path::new("/usr/lib/postgresql");
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };

    let mut versions: Vec<(u32, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let version = entry.file_name().to_string_lossy().parse::<u32>().ok()?;
            Some((version, entry.path().join("bin")))
        })
        .collect();
    versions.sort_by(|a, b| b.0.cmp(&a.0));
    versions.into_iter().map(|(_, dir)| dir).collect()
}
