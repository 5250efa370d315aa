//! Build script helper
//!
//! Call [`generate_from_manifest`] from `build.rs` to regenerate table bindings
//! on every build that touches the changelog or the configuration:
//!
//! ```no_run
//! // build.rs
//! fn main() {
//!     if let Err(e) = tidepool_build::build_script::generate_from_manifest() {
//!         panic!("tidepool: {}", e);
//!     }
//! }
//! ```
//!
//! Set `TIDEPOOL_SKIP=1` to skip generation, e.g. on machines without
//! PostgreSQL binaries that build from checked-in sources.

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::orchestrator::{BuildOutcome, ChangelogRunner, Orchestrator};
use std::env;
use std::path::{Path, PathBuf};
use tidepool::changelog::load_changelog;

/// Environment variable that disables generation
pub const SKIP_ENV: &str = "TIDEPOOL_SKIP";

/// Run the build step for the crate being built
///
/// Uses `CARGO_MANIFEST_DIR` as the project root. Returns `Ok(None)` when
/// generation was skipped.
pub fn generate_from_manifest() -> Result<Option<BuildOutcome>, BuildError> {
    println!("cargo:rerun-if-env-changed={}", SKIP_ENV);
    if skip_requested(env::var(SKIP_ENV).ok().as_deref()) {
        println!("cargo:warning={} is set, skipping code generation", SKIP_ENV);
        return Ok(None);
    }

    let project_root = env::var_os("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .ok_or(BuildError::MissingManifestDir)?;
    generate_for_project(&project_root).map(Some)
}

/// Run the build step for the project rooted at `project_root`
///
/// Prints `cargo:rerun-if-changed` directives before generating.
pub fn generate_for_project(project_root: &Path) -> Result<BuildOutcome, BuildError> {
    let (config, source) = BuildConfig::discover(project_root)?;
    for directive in rerun_directives(project_root, &config, &source) {
        println!("{}", directive);
    }

    let orchestrator = Orchestrator::new(config.database.embedded_settings())
        .with_migration_runner(Box::new(ChangelogRunner::new(config.changelog.lock_timeout())));
    Ok(orchestrator.execute(&config.changelog.file, &config.generator, project_root)?)
}

/// `cargo:rerun-if-changed` lines for the configuration and every changelog file
///
/// When the changelog cannot be loaded only the root changelog path is
/// watched; the load error itself is reported by the migration.
pub fn rerun_directives(project_root: &Path, config: &BuildConfig, config_source: &Path) -> Vec<String> {
    let mut paths = vec![config_source.to_path_buf()];
    match load_changelog(project_root, &config.changelog.file) {
        Ok(change_log) => paths.extend(change_log.source_files),
        Err(e) => {
            log::debug!("Watching root changelog only: {}", e);
            paths.push(project_root.join(&config.changelog.file));
        }
    }

    paths
        .iter()
        .map(|path| format!("cargo:rerun-if-changed={}", path.display()))
        .collect()
}

/// Whether a [`SKIP_ENV`] value asks to skip generation
pub fn skip_requested(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        Some(value) => value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes"),
        None => false,
    }
}
