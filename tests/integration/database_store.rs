//! Integration tests for the database backend (SQLite)
//!
//! These tests verify that:
//! - Data survives closing and reconnecting
//! - The facade selects the database when a DSN is configured
//! - Concurrent counter upserts are applied atomically by the database

use std::sync::Arc;

use metric_store::metrics::{MetricKind, MetricValue, NamedMetric};
use metric_store::storage::database::DatabaseStore;
use metric_store::storage::{self, Storage, StorageConfig};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::*;

#[tokio::test]
async fn test_data_survives_reconnect() {
    let temp_dir = tempdir().unwrap();
    let dsn = sqlite_dsn(temp_dir.path());

    {
        let store = DatabaseStore::connect_with(&dsn, fast_retry()).await.unwrap();
        store.update("temp", MetricValue::Gauge(12.5)).await.unwrap();
        store.update("hits", MetricValue::Counter(2)).await.unwrap();
        store.close().await.unwrap();
    }

    let store = DatabaseStore::connect_with(&dsn, fast_retry()).await.unwrap();
    store.update("hits", MetricValue::Counter(3)).await.unwrap();

    assert_eq!(
        store.list().await.unwrap(),
        vec![
            NamedMetric::gauge("temp", 12.5),
            NamedMetric::counter("hits", 5),
        ]
    );
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_facade_bulk_update_and_ping() {
    let temp_dir = tempdir().unwrap();
    let config = StorageConfig {
        database_dsn: Some(sqlite_dsn(temp_dir.path())),
        file_path: snapshot_path(temp_dir.path()),
        ..StorageConfig::default()
    };

    let store = storage::open(&config).await.unwrap();
    storage::ping(store.as_ref()).await.unwrap();

    storage::bulk_update(
        store.as_ref(),
        &[
            NamedMetric::counter("hits", 1),
            NamedMetric::gauge("temp", 4.0),
            NamedMetric::counter("hits", 2),
        ],
    )
    .await
    .unwrap();

    assert_eq!(
        store.get(MetricKind::Counter, "hits").await.unwrap(),
        MetricValue::Counter(3)
    );
    assert_eq!(
        store.get(MetricKind::Gauge, "temp").await.unwrap(),
        MetricValue::Gauge(4.0)
    );

    // no snapshot file in database mode
    assert!(!config.file_path.exists());
    store.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_counter_upserts() {
    let temp_dir = tempdir().unwrap();
    let store: Arc<dyn Storage> = Arc::new(
        DatabaseStore::connect_with(&sqlite_dsn(temp_dir.path()), fast_retry())
            .await
            .unwrap(),
    );

    let mut tasks = vec![];
    for _ in 0..4 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                store.update("hits", MetricValue::Counter(1)).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(
        store.get(MetricKind::Counter, "hits").await.unwrap(),
        MetricValue::Counter(40)
    );
    store.close().await.unwrap();
}
