use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

const CONFIG_FILE_ENV: &str = "INCIDENTS_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config/incidents.toml";
const ENV_PREFIX: &str = "INCIDENTS";

/// Everything outside the RFC 3986 unreserved set is escaped in credentials.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Conventional flat variables and the setting each one overrides. Later
/// entries win, so `DATABASE_URL` beats `MONGODB_URL`.
const FLAT_VARIABLES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("DB_NAME", "database.name"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_CLUSTER", "database.cluster"),
    ("DB_IDENTIFIER", "database.identifier"),
    ("MONGODB_URL", "database.url"),
    ("DATABASE_URL", "database.url"),
];

/// Process configuration, read once at start.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration from `.env`, the optional TOML file, `INCIDENTS_*`
    /// variables and finally the conventional flat variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let file = std::env::var(CONFIG_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let flat: Vec<(&str, Option<String>)> = FLAT_VARIABLES
            .iter()
            .map(|(var, key)| (*key, std::env::var(var).ok()))
            .collect();

        Self::from_sources(&file, &flat)
    }

    pub fn from_sources(file: &Path, flat: &[(&str, Option<String>)]) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from(file.to_path_buf()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        for (key, value) in flat {
            builder = builder
                .set_override_option(*key, value.clone())
                .with_context(|| format!("invalid override for '{key}'"))?;
        }

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        cfg.try_deserialize()
            .with_context(|| "failed to deserialize configuration")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        5000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Full connection string. Takes precedence over the credential parts.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
    #[serde(default = "DatabaseSettings::default_server_selection_timeout_ms")]
    pub server_selection_timeout_ms: u64,
    /// Upper bound for connect plus collection setup. Unset means no limit.
    #[serde(default)]
    pub bootstrap_timeout_ms: Option<u64>,
}

impl DatabaseSettings {
    fn default_name() -> String {
        "mongoIncidencias".to_string()
    }

    fn default_server_selection_timeout_ms() -> u64 {
        10_000
    }

    pub fn bootstrap_deadline(&self) -> Option<Duration> {
        self.bootstrap_timeout_ms.map(Duration::from_millis)
    }

    /// Connection string for the driver: `url` when set, otherwise an Atlas
    /// SRV string assembled from the credential parts.
    pub fn connection_uri(&self) -> anyhow::Result<String> {
        if let Some(url) = non_empty(&self.url) {
            return Ok(url.to_string());
        }

        fn part<'v>(value: &'v Option<String>, var: &str) -> anyhow::Result<&'v str> {
            non_empty(value).ok_or_else(|| {
                anyhow!(
                    "missing database setting {var}; set DATABASE_URL or \
                     DB_USER, DB_PASSWORD, DB_CLUSTER and DB_IDENTIFIER"
                )
            })
        }

        let user = part(&self.user, "DB_USER")?;
        let password = part(&self.password, "DB_PASSWORD")?;
        let cluster = part(&self.cluster, "DB_CLUSTER")?;
        let identifier = part(&self.identifier, "DB_IDENTIFIER")?;

        Ok(format!(
            "mongodb+srv://{}:{}@{cluster}.{identifier}.mongodb.net/?retryWrites=true&w=majority",
            encode_userinfo(user),
            encode_userinfo(password),
        ))
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            user: None,
            password: None,
            cluster: None,
            identifier: None,
            name: Self::default_name(),
            server_selection_timeout_ms: Self::default_server_selection_timeout_ms(),
            bootstrap_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn encode_userinfo(value: &str) -> String {
    utf8_percent_encode(value, USERINFO).to_string()
}
