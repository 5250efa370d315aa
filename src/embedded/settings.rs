//! Settings for embedded servers

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Superuser created by `initdb` for every embedded server
pub const DEFAULT_USER: &str = "postgres";
/// Password placed in connection URLs. The server uses trust auth on localhost.
pub const DEFAULT_PASSWORD: &str = "postgres";
/// Database that exists right after `initdb`
pub const DEFAULT_DATABASE: &str = "postgres";

/// Credentials used to reach an embedded server
///
/// These are plain values handed to the bootstrapper, so two servers started in
/// the same process never share state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user: DEFAULT_USER.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            database: DEFAULT_DATABASE.to_string(),
        }
    }
}

/// How an embedded server is initialized and started
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedSettings {
    /// Directory holding `initdb` and `pg_ctl`. `None` searches the environment.
    pub bin_dir: Option<PathBuf>,
    /// Listen address
    pub host: String,
    /// Fixed port. `None` picks a free one.
    pub port: Option<u16>,
    pub credentials: Credentials,
    /// Passed to `pg_ctl -t` and to the readiness probe
    pub startup_timeout: Duration,
    /// Locale given to `initdb`
    pub locale: String,
    /// Extra `-c name=value` server settings
    pub server_config: BTreeMap<String, String>,
}

impl Default for EmbeddedSettings {
    fn default() -> Self {
        let mut server_config = BTreeMap::new();
        // Throwaway data, durability is irrelevant.
        server_config.insert("fsync".to_string(), "off".to_string());
        server_config.insert("synchronous_commit".to_string(), "off".to_string());
        server_config.insert("full_page_writes".to_string(), "off".to_string());
        server_config.insert("max_connections".to_string(), "300".to_string());

        Self {
            bin_dir: None,
            host: "127.0.0.1".to_string(),
            port: None,
            credentials: Credentials::default(),
            startup_timeout: Duration::from_secs(60),
            locale: "C".to_string(),
            server_config,
        }
    }
}

impl EmbeddedSettings {
    /// Arguments for `initdb`, excluding the data directory
    pub fn initdb_args(&self) -> Vec<String> {
        vec![
            "-U".to_string(),
            self.credentials.user.clone(),
            "-A".to_string(),
            "trust".to_string(),
            "-E".to_string(),
            "UTF8".to_string(),
            format!("--locale={}", self.locale),
            "--no-sync".to_string(),
        ]
    }

    /// The single option string handed to `pg_ctl -o`
    pub fn server_options(&self, port: u16, socket_dir: Option<&str>) -> String {
        let mut options = vec![
            "-p".to_string(),
            port.to_string(),
            "-h".to_string(),
            quote_option(&self.host),
        ];
        if let Some(dir) = socket_dir {
            options.push("-k".to_string());
            options.push(quote_option(dir));
        }
        // Disables fsync at the postmaster level as well
        options.push("-F".to_string());
        for (name, value) in &self.server_config {
            options.push("-c".to_string());
            options.push(format!("{}={}", name, quote_option(value)));
        }
        options.join(" ")
    }
}

fn quote_option(value: &str) -> String {
    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        format!("'{}'", value.replace('\'', "'\\''"))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_credentials() {
        let creds = Credentials::default();
        assert_eq!(creds.user, "postgres");
        assert_eq!(creds.password, "postgres");
        assert_eq!(creds.database, "postgres");
    }

    #[test]
    fn test_initdb_args_use_superuser_and_trust_auth() {
        let mut settings = EmbeddedSettings::default();
        settings.credentials.user = "builder".to_string();
        let args = settings.initdb_args();
        assert!(args.windows(2).any(|w| w[0] == "-U" && w[1] == "builder"));
        assert!(args.windows(2).any(|w| w[0] == "-A" && w[1] == "trust"));
        assert!(args.contains(&"--locale=C".to_string()));
    }

    #[test]
    fn test_server_options_include_port_and_config() {
        let settings = EmbeddedSettings::default();
        let options = settings.server_options(54321, Some("/tmp/pg sock"));
        assert!(options.starts_with("-p 54321 -h 127.0.0.1"));
        assert!(options.contains("-k '/tmp/pg sock'"));
        assert!(options.contains("-c fsync=off"));
        assert!(options.contains("-c max_connections=300"));
    }

    #[test]
    fn test_server_options_quote_values_with_spaces() {
        let mut settings = EmbeddedSettings::default();
        settings.server_config.clear();
        settings
            .server_config
            .insert("application_name".to_string(), "tide pool".to_string());
        let options = settings.server_options(5432, None);
        assert_eq!(options, "-p 5432 -h 127.0.0.1 -F -c application_name='tide pool'");
    }
}
