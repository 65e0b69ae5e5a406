use std::{collections::HashSet, net::SocketAddr, path::PathBuf};

use blobsync_core::DatabaseSpec;
use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

#[derive(Parser, Debug, Default)]
#[command(name = "blobsync", about = "BlobSync - sync endpoint for client-encrypted records")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "blobsync.toml")]
    pub config: String,

    /// Port to listen on (overrides config file and PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Directory holding the database files (overrides config file and DATA_DIR)
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
    #[error("invalid {name} value: {value}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("no API key configured; set API_KEY or [auth] api_key")]
    MissingApiKey,
    #[error("at least one database must be declared")]
    NoDatabases,
    #[error("database {0} is declared twice")]
    DuplicateDatabase(String),
    #[error("invalid database name {0:?}; use letters, digits, '-' or '_'")]
    InvalidDatabaseName(String),
    #[error("database {database} has an invalid collection list: {reason}")]
    InvalidCollections { database: String, reason: String },
    #[error("invalid listen address {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default = "default_databases")]
    pub databases: Vec<DatabaseSpec>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// Shared secret every request must present as `Authorization: Bearer <key>`.
    #[serde(default)]
    pub api_key: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig").field("api_key", &"<redacted>").finish()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// One pretty-printed JSON document per database.
    #[default]
    Json,
    /// One SQLite file per database.
    Sqlite,
    /// Nothing is written to disk.
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsConfig {
    /// Address for a Prometheus scrape listener. Disabled when unset.
    #[serde(default)]
    pub listen: Option<String>,
}

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
        max_body_bytes: default_max_body_bytes(),
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        backend: StorageKind::default(),
        data_dir: default_data_dir(),
    }
}

fn default_databases() -> Vec<DatabaseSpec> {
    vec![
        DatabaseSpec::new("statements", &["statements", "standingorders", "standingorders_statements"]),
        DatabaseSpec::new("categories", &["categories"]),
    ]
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./db")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: default_server(),
            logging: default_logging(),
            auth: AuthConfig::default(),
            storage: default_storage(),
            metrics: MetricsConfig::default(),
            databases: default_databases(),
        }
    }
}

impl Config {
    /// Builds the process configuration: defaults, then the config file,
    /// then the environment, then CLI flags.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        Config::load_with_env(cli, |name| std::env::var(name).ok())
    }

    /// Same as [`Config::load`] with an explicit environment lookup.
    /// Only a missing config file falls back to the defaults.
    pub fn load_with_env(cli: &CliArgs, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Config::from_toml(&contents).map_err(|source| ConfigError::Parse {
                path: cli.config.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: cli.config.clone(),
                    source,
                })
            }
        };

        config.apply_env(var)?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(key) = var("API_KEY") {
            self.auth.api_key = key;
        }
        if let Some(host) = var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name: "PORT", value: port })?;
        }
        if let Some(dir) = var("DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, cli: &CliArgs) {
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(ref level) = cli.log_level {
            self.logging.level = level.clone();
        }
        if let Some(ref dir) = cli.data_dir {
            self.storage.data_dir = dir.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.databases.is_empty() {
            return Err(ConfigError::NoDatabases);
        }

        let mut names = HashSet::new();
        for db in &self.databases {
            if !is_valid_database_name(&db.name) {
                return Err(ConfigError::InvalidDatabaseName(db.name.clone()));
            }
            if !names.insert(db.name.as_str()) {
                return Err(ConfigError::DuplicateDatabase(db.name.clone()));
            }
            let invalid = |reason: &str| ConfigError::InvalidCollections {
                database: db.name.clone(),
                reason: reason.to_string(),
            };
            if db.collections.is_empty() {
                return Err(invalid("no collections"));
            }
            let mut seen = HashSet::new();
            for collection in &db.collections {
                if collection.is_empty() {
                    return Err(invalid("empty collection name"));
                }
                if !seen.insert(collection.as_str()) {
                    return Err(invalid(&format!("{} is declared twice", collection)));
                }
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }

    pub fn metrics_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        match &self.metrics.listen {
            Some(addr) => addr
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidAddress(addr.clone())),
            None => Ok(None),
        }
    }
}

/// Database names become file names under the data directory.
fn is_valid_database_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
