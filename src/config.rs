use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use tracing::trace;

use crate::storage::StorageConfig;

const DEFAULT_ADDRESS: &str = "localhost:8080";

const DEFAULT_STORE_INTERVAL: u64 = 300;

const DEFAULT_FILE_STORAGE_PATH: &str = "metrics.sav";

/// Command line arguments of the server
///
/// Every flag falls back to an environment variable, then to the JSON
/// config file, then to the built-in default.
#[derive(Debug, Clone, Default, Parser)]
#[command(about = "Collects gauges and counters and keeps them around")]
pub struct ServerArgs {
    /// host:port to listen on
    #[arg(short = 'a', long, env = "ADDRESS")]
    pub address: Option<String>,

    /// Seconds between snapshots, 0 makes saving synchronous
    #[arg(short = 'i', long, env = "STORE_INTERVAL")]
    pub store_interval: Option<u64>,

    /// File to store metrics in
    #[arg(short = 'f', long, env = "FILE_STORAGE_PATH")]
    pub file_storage_path: Option<PathBuf>,

    /// Restore metrics from the file on start
    #[arg(short = 'r', long, env = "RESTORE", action = ArgAction::Set)]
    pub restore: Option<bool>,

    /// Database connection string, selects the database backend
    #[arg(short = 'd', long, env = "DATABASE_DSN")]
    pub database_dsn: Option<String>,

    /// JSON config file
    #[arg(short = 'c', long = "config", env = "CONFIG")]
    pub config: Option<PathBuf>,
}

/// Contents of the optional JSON config file
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub address: Option<String>,

    /// Seconds between snapshots
    pub store_interval: Option<u64>,

    pub store_file: Option<PathBuf>,

    pub restore: Option<bool>,

    pub database_dsn: Option<String>,
}

/// Fully resolved server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub address: String,
    pub storage: StorageConfig,
}

impl ServerConfig {
    /// Merge the arguments with the config file they point to, if any
    pub fn resolve(args: ServerArgs) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => read_config_file(path)?,
            None => FileConfig::default(),
        };

        Ok(Self::merge(args, file))
    }

    fn merge(args: ServerArgs, file: FileConfig) -> Self {
        let interval = args
            .store_interval
            .or(file.store_interval)
            .unwrap_or(DEFAULT_STORE_INTERVAL);

        Self {
            address: args
                .address
                .or(file.address)
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            storage: StorageConfig {
                interval: Duration::from_secs(interval),
                file_path: args
                    .file_storage_path
                    .or(file.store_file)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_STORAGE_PATH)),
                restore: args.restore.or(file.restore).unwrap_or(true),
                database_dsn: args
                    .database_dsn
                    .or(file.database_dsn)
                    .filter(|dsn| !dsn.is_empty()),
                in_memory: false,
            },
        }
    }
}

pub fn read_config_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<FileConfig> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
