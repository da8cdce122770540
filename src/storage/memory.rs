//! In-memory storage backend (no persistence)
//!
//! Metrics live in a table keyed by kind and name. It's useful for:
//! - Testing without database or file dependencies
//! - As the working set of the file-backed store
//!
//! The table is guarded by a lock that every operation takes, so updates
//! and the enumeration done by a snapshot never observe each other halfway.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::backend::{Storage, check_update};
use super::error::{StorageError, StorageResult};
use crate::metrics::{MetricKind, MetricValue, NamedMetric};

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    metrics: RwLock<HashMap<MetricKind, HashMap<String, MetricValue>>>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored metrics across both kinds
    pub async fn len(&self) -> usize {
        self.metrics.read().await.values().map(HashMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Storage for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, kind: MetricKind, name: &str) -> StorageResult<MetricValue> {
        self.metrics
            .read()
            .await
            .get(&kind)
            .and_then(|by_name| by_name.get(name))
            .copied()
            .ok_or_else(|| StorageError::NotFound {
                kind,
                name: name.to_string(),
            })
    }

    async fn update(&self, name: &str, value: MetricValue) -> StorageResult<()> {
        check_update(name, &value)?;

        let mut metrics = self.metrics.write().await;
        let by_name = metrics.entry(value.kind()).or_default();

        match by_name.get_mut(name) {
            Some(stored) => {
                // only overwrite once the merge succeeded
                *stored = stored
                    .merge(value)
                    .map_err(|source| StorageError::InvalidMetric {
                        name: name.to_string(),
                        source,
                    })?;
                trace!("merged {} {} into {}", value.kind(), name, stored);
            }
            None => {
                by_name.insert(name.to_string(), value);
                trace!("created {} {} = {}", value.kind(), name, value);
            }
        }

        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<NamedMetric>> {
        let metrics = self.metrics.read().await;

        Ok(metrics
            .values()
            .flat_map(|by_name| {
                by_name
                    .iter()
                    .map(|(name, value)| NamedMetric::new(name.clone(), *value))
            })
            .collect())
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
