//! Storage backends for metric persistence
//!
//! This module provides a trait-based abstraction over three backends that
//! share the same merge semantics (gauges replace, counters accumulate):
//!
//! - **Memory**: a lock-guarded table, no persistence (tests, ephemeral runs)
//! - **File**: the memory table plus periodic or synchronous snapshots
//! - **Database**: PostgreSQL (or SQLite) tables, see [`database`]
//!
//! ## Usage
//!
//! ```no_run
//! use metric_store::metrics::{MetricKind, MetricValue};
//! use metric_store::storage::{self, StorageConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = storage::open(&StorageConfig::default()).await?;
//!     store.update("requests", MetricValue::Counter(5)).await?;
//!     let value = store.get(MetricKind::Counter, "requests").await?;
//!     store.close().await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
#[cfg(feature = "database")]
pub mod database;
pub mod error;
pub mod file;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

pub use backend::{BulkUpdate, Ping, Storage};
pub use error::{StorageError, StorageResult};
pub use file::{FileStore, FileStoreOptions};
pub use memory::MemoryStore;

use crate::metrics::NamedMetric;

/// Configuration consumed by [`open`]
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// Snapshot interval, zero makes every update write a snapshot
    pub interval: Duration,

    /// Snapshot file path
    pub file_path: PathBuf,

    /// Load the snapshot on startup
    pub restore: bool,

    /// Connection string, selects the database backend when set
    pub database_dsn: Option<String>,

    /// Skip persistence entirely
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            interval: file::DEFAULT_INTERVAL,
            file_path: PathBuf::from("metrics.sav"),
            restore: true,
            database_dsn: None,
            in_memory: false,
        }
    }
}

/// Open the backend selected by the configuration
///
/// A database connection string takes precedence, then the in-memory flag,
/// the file-backed store is the fallback.
pub async fn open(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    if let Some(dsn) = config.database_dsn.as_deref().filter(|dsn| !dsn.is_empty()) {
        info!("using database for storage");
        return open_database(dsn).await;
    }

    if config.in_memory {
        info!("using in-memory storage, metrics will not be persisted");
        return Ok(Arc::new(MemoryStore::new()));
    }

    info!("using file storage at {}", config.file_path.display());
    let options = FileStoreOptions::new(&config.file_path)
        .interval(config.interval)
        .restore(config.restore);
    Ok(Arc::new(FileStore::open(options).await))
}

#[cfg(feature = "database")]
async fn open_database(dsn: &str) -> StorageResult<Arc<dyn Storage>> {
    Ok(Arc::new(database::DatabaseStore::connect(dsn).await?))
}

#[cfg(not(feature = "database"))]
async fn open_database(_dsn: &str) -> StorageResult<Arc<dyn Storage>> {
    Err(StorageError::InvalidConfig(
        "a database DSN was given but database support is not compiled in".to_string(),
    ))
}

/// Apply a batch atomically, if the backend supports it
pub async fn bulk_update(storage: &dyn Storage, metrics: &[NamedMetric]) -> StorageResult<()> {
    match storage.as_bulk_update() {
        Some(bulk) => bulk.bulk_update(metrics).await,
        None => Err(StorageError::Unsupported {
            capability: "bulk updates",
            backend: storage.backend_name(),
        }),
    }
}

/// Check the underlying connection, if the backend has one
pub async fn ping(storage: &dyn Storage) -> StorageResult<()> {
    match storage.as_ping() {
        Some(pinger) => pinger.ping().await,
        None => Err(StorageError::Unsupported {
            capability: "ping (not a database)",
            backend: storage.backend_name(),
        }),
    }
}
