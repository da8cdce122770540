//! Storage backend trait definition
//!
//! This module defines the core `Storage` trait that all backends implement,
//! plus the optional capabilities only some of them provide.

use async_trait::async_trait;

use super::error::{StorageError, StorageResult};
use crate::metrics::{MetricKind, MetricValue, NamedMetric};

/// Trait for metric storage backends
///
/// Implemented by the in-memory, file-backed and database stores. Callers
/// hold an `Arc<dyn Storage>` and never need to know which one is active.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`: every method may be called
/// concurrently from many request handlers while a backend-internal task
/// (e.g. the snapshot loop) runs in the background.
///
/// ## Optional capabilities
///
/// Atomic batch updates and connectivity checks are only meaningful for
/// some backends. They are discovered through [`Storage::as_bulk_update`]
/// and [`Storage::as_ping`], which return `None` by default.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Short backend name for logs and error messages
    fn backend_name(&self) -> &'static str;

    /// Get the current value of a metric
    ///
    /// Fails with `StorageError::NotFound` if the (kind, name) pair has
    /// never been written.
    async fn get(&self, kind: MetricKind, name: &str) -> StorageResult<MetricValue>;

    /// Merge a value into the stored metric, creating it if necessary
    ///
    /// Gauges are replaced, counters accumulate.
    async fn update(&self, name: &str, value: MetricValue) -> StorageResult<()>;

    /// List all stored metrics, in no particular order
    async fn list(&self) -> StorageResult<Vec<NamedMetric>>;

    /// Close the backend and release resources
    ///
    /// Flushes any pending writes before returning.
    async fn close(&self) -> StorageResult<()>;

    fn as_bulk_update(&self) -> Option<&dyn BulkUpdate> {
        None
    }

    fn as_ping(&self) -> Option<&dyn Ping> {
        None
    }
}

/// Atomic batch updates
#[async_trait]
pub trait BulkUpdate: Send + Sync {
    /// Apply all updates or none of them
    async fn bulk_update(&self, metrics: &[NamedMetric]) -> StorageResult<()>;
}

/// Connectivity check against an underlying connection
#[async_trait]
pub trait Ping: Send + Sync {
    async fn ping(&self) -> StorageResult<()>;
}

/// Checks shared by every backend before a value is written
pub(crate) fn check_update(name: &str, value: &MetricValue) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::EmptyName);
    }

    value.validate().map_err(|source| StorageError::InvalidMetric {
        name: name.to_string(),
        source,
    })
}
