//! Error types for storage operations

use std::fmt;
use std::path::PathBuf;

use crate::metrics::{MetricError, MetricKind};

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug)]
pub enum StorageError {
    /// The requested metric has never been written
    NotFound { kind: MetricKind, name: String },

    /// The update could not be merged into the stored value
    InvalidMetric { name: String, source: MetricError },

    /// The metric name is empty
    EmptyName,

    /// Reading or writing the snapshot file failed
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A snapshot line could not be decoded
    Snapshot { line: usize, reason: String },

    /// The backend does not implement an optional capability
    Unsupported {
        capability: &'static str,
        backend: &'static str,
    },

    /// Invalid configuration
    InvalidConfig(String),

    /// Database connection failed
    ConnectionFailed(String),

    /// Migration failed
    MigrationFailed(String),

    /// Database query failed (after retries, if the error was transient)
    #[cfg(feature = "database")]
    Database {
        operation: &'static str,
        source: sqlx::Error,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, StorageError::Unsupported { .. })
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| StorageError::Persistence { path, source }
    }

    #[cfg(feature = "database")]
    pub(crate) fn database(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| StorageError::Database { operation, source }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound { kind, name } => {
                write!(f, "metric not found: {} {}", kind, name)
            }
            StorageError::InvalidMetric { name, source } => {
                write!(f, "cannot update metric {}: {}", name, source)
            }
            StorageError::EmptyName => write!(f, "metric name must not be empty"),
            StorageError::Persistence { path, source } => {
                write!(f, "snapshot I/O on {} failed: {}", path.display(), source)
            }
            StorageError::Snapshot { line, reason } => {
                write!(f, "corrupt snapshot at line {}: {}", line, reason)
            }
            StorageError::Unsupported {
                capability,
                backend,
            } => write!(f, "{} backend does not support {}", backend, capability),
            StorageError::InvalidConfig(msg) => write!(f, "invalid storage configuration: {}", msg),
            StorageError::ConnectionFailed(msg) => {
                write!(f, "failed to connect to storage backend: {}", msg)
            }
            StorageError::MigrationFailed(msg) => write!(f, "database migration failed: {}", msg),
            #[cfg(feature = "database")]
            StorageError::Database { operation, source } => {
                write!(f, "database {} failed: {}", operation, source)
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::InvalidMetric { source, .. } => Some(source),
            StorageError::Persistence { source, .. } => Some(source),
            #[cfg(feature = "database")]
            StorageError::Database { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::migrate::MigrateError> for StorageError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StorageError::MigrationFailed(err.to_string())
    }
}
