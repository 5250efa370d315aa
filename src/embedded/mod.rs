//! Disposable PostgreSQL servers
//!
//! An [`EmbeddedPostgres`] owns a temporary directory holding a freshly
//! initialized cluster and a server process bound to a local port. The server
//! is stopped and the directory removed by [`EmbeddedPostgres::close`]; dropping
//! an unclosed handle performs the same cleanup on a best-effort basis.
//!
//! # Example
//!
//! ```no_run
//! use tidepool::embedded::EmbeddedPostgres;
//!
//! let postgres = EmbeddedPostgres::builder().start()?;
//! let url = postgres.connection_url("postgres", "postgres");
//! // ... use the server ...
//! postgres.close()?;
//! # Ok::<(), tidepool::embedded::EmbeddedError>(())
//! ```

mod binaries;
mod error;
mod settings;

pub use binaries::{PgBinaries, BIN_DIR_ENV};
pub use error::EmbeddedError;
pub use settings::{Credentials, EmbeddedSettings, DEFAULT_DATABASE, DEFAULT_PASSWORD, DEFAULT_USER};

use crate::connection::{postgres_url, wait_until_ready};
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tempfile::TempDir;

const LOG_FILE: &str = "postgres.log";

/// A running, single-use PostgreSQL server
#[derive(Debug)]
pub struct EmbeddedPostgres {
    settings: EmbeddedSettings,
    binaries: PgBinaries,
    port: u16,
    base_dir: Option<TempDir>,
    running: bool,
}

/// Builder for [`EmbeddedPostgres`]
#[derive(Debug, Clone, Default)]
pub struct EmbeddedPostgresBuilder {
    settings: EmbeddedSettings,
}

impl EmbeddedPostgresBuilder {
    pub fn settings(mut self, settings: EmbeddedSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.bin_dir = Some(dir.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.settings.port = Some(port);
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.settings.credentials = credentials;
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.settings.startup_timeout = timeout;
        self
    }

    pub fn server_config(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.server_config.insert(name.into(), value.into());
        self
    }

    pub fn start(self) -> Result<EmbeddedPostgres, EmbeddedError> {
        EmbeddedPostgres::start(self.settings)
    }
}

impl EmbeddedPostgres {
    pub fn builder() -> EmbeddedPostgresBuilder {
        EmbeddedPostgresBuilder::default()
    }

    /// Initialize a cluster in a fresh temporary directory and start a server on it
    ///
    /// # Errors
    ///
    /// - `BinaryNotFound` if `initdb` / `pg_ctl` cannot be located
    /// - `CommandFailed` if either utility exits unsuccessfully
    /// - `NoFreePort` if no local port can be reserved
    /// - `NotReady` if the server never accepts a connection
    pub fn start(settings: EmbeddedSettings) -> Result<Self, EmbeddedError> {
        let binaries = PgBinaries::locate(settings.bin_dir.as_deref())?;
        log::debug!("Using PostgreSQL binaries: {:?}", binaries);

        let base_dir = tempfile::Builder::new()
            .prefix("tidepool-pg-")
            .tempdir()
            .map_err(|e| EmbeddedError::io("Failed to create temporary directory", e))?;

        let data_dir = base_dir.path().join("data");
        let mut initdb = Command::new(&binaries.initdb);
        initdb.arg("-D").arg(&data_dir).args(settings.initdb_args());
        run_command(&mut initdb, "initdb")?;

        let port = match settings.port {
            Some(port) if port != 0 => port,
            _ => free_port(&settings.host)?,
        };

        let mut instance = Self {
            settings,
            binaries,
            port,
            base_dir: Some(base_dir),
            // Set before `pg_ctl start` so a half-started server is still stopped on drop.
            running: true,
        };
        instance.start_server()?;

        let probe_url = instance.connection_url(
            &instance.settings.credentials.user,
            &instance.settings.credentials.database,
        );
        wait_until_ready(&probe_url, instance.settings.startup_timeout)
            .map_err(|source| EmbeddedError::NotReady { port, source })?;

        log::debug!("Embedded Postgres ready at {}", instance.data_dir().display());
        Ok(instance)
    }

    /// Port the server listens on
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address the server listens on
    pub fn host(&self) -> &str {
        &self.settings.host
    }

    pub fn credentials(&self) -> &Credentials {
        &self.settings.credentials
    }

    /// The cluster's data directory
    pub fn data_dir(&self) -> PathBuf {
        self.base_path().join("data")
    }

    /// Connection URL for `user` on `database`, using the configured password
    pub fn connection_url(&self, user: &str, database: &str) -> String {
        postgres_url(
            user,
            &self.settings.credentials.password,
            &self.settings.host,
            self.port,
            database,
        )
    }

    /// Stop the server and remove its directory
    ///
    /// Both steps are attempted. The first failure is returned.
    pub fn close(mut self) -> Result<(), EmbeddedError> {
        let stopped = self.stop_server();
        let removed = match self.base_dir.take() {
            Some(dir) if stopped.is_ok() => dir
                .close()
                .map_err(|e| EmbeddedError::io("Failed to remove embedded Postgres directory", e)),
            // Removing the directory under a live server would corrupt it; leave it to drop.
            Some(dir) => {
                self.base_dir = Some(dir);
                Ok(())
            }
            None => Ok(()),
        };
        stopped.and(removed)
    }

    fn base_path(&self) -> &Path {
        self.base_dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }

    fn start_server(&mut self) -> Result<(), EmbeddedError> {
        let base = self.base_path().to_path_buf();
        let socket_dir = if cfg!(unix) {
            Some(base.to_string_lossy().into_owned())
        } else {
            None
        };
        let options = self.settings.server_options(self.port, socket_dir.as_deref());

        let mut pg_ctl = Command::new(&self.binaries.pg_ctl);
        pg_ctl
            .arg("-D")
            .arg(self.data_dir())
            .arg("-l")
            .arg(base.join(LOG_FILE))
            .arg("-w")
            .arg("-t")
            .arg(self.settings.startup_timeout.as_secs().max(1).to_string())
            .arg("-o")
            .arg(options)
            .arg("start");

        run_command(&mut pg_ctl, "pg_ctl start").map_err(|e| match e {
            EmbeddedError::CommandFailed {
                command,
                status,
                output,
            } => EmbeddedError::CommandFailed {
                command,
                status,
                output: format!("{}\n--- server log ---\n{}", output, self.log_tail(20)),
            },
            other => other,
        })?;
        Ok(())
    }

    fn stop_server(&mut self) -> Result<(), EmbeddedError> {
        if !self.running {
            return Ok(());
        }

        let mut pg_ctl = Command::new(&self.binaries.pg_ctl);
        pg_ctl
            .arg("-D")
            .arg(self.data_dir())
            .arg("-m")
            .arg("fast")
            .arg("-w")
            .arg("-t")
            .arg(self.settings.startup_timeout.as_secs().max(1).to_string())
            .arg("stop");
        run_command(&mut pg_ctl, "pg_ctl stop")?;

        self.running = false;
        log::debug!("Stopped embedded Postgres on port {}", self.port);
        Ok(())
    }

    fn log_tail(&self, lines: usize) -> String {
        let Ok(content) = fs::read_to_string(self.base_path().join(LOG_FILE)) else {
            return String::from("<no server log>");
        };
        let all: Vec<&str> = content.lines().collect();
        all[all.len().saturating_sub(lines)..].join("\n")
    }
}

impl Drop for EmbeddedPostgres {
    fn drop(&mut self) {
        // Errors cannot be propagated from drop; `close()` is the reporting path.
        if let Err(e) = self.stop_server() {
            log::warn!("Failed to stop embedded Postgres on port {}: {}", self.port, e);
        }
    }
}

/// Reserve a free port by binding to port 0 and releasing it
pub fn free_port(host: &str) -> Result<u16, EmbeddedError> {
    let no_port = |source| EmbeddedError::NoFreePort {
        host: host.to_string(),
        source,
    };
    let listener = TcpListener::bind((host, 0)).map_err(no_port)?;
    let port = listener.local_addr().map_err(no_port)?.port();
    Ok(port)
}

fn run_command(command: &mut Command, description: &str) -> Result<Output, EmbeddedError> {
    log::debug!("Running {:?}", command);
    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|e| EmbeddedError::io(format!("Failed to run {}", description), e))?;

    if output.status.success() {
        return Ok(output);
    }

    let mut text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim());
    }

    Err(EmbeddedError::CommandFailed {
        command: description.to_string(),
        status: output.status.to_string(),
        output: text,
    })
}
