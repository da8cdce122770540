//! Integration tests for snapshot persistence
//!
//! These tests verify that:
//! - Metrics survive a close and reopen
//! - Restore can be disabled
//! - Snapshots are written in sorted, one-object-per-line form
//! - Restoring from a snapshot folds duplicate counter lines

use metric_store::metrics::{MetricKind, MetricValue, NamedMetric};
use metric_store::storage::{self, FileStore, FileStoreOptions, Storage, StorageConfig};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tempfile::tempdir;

use crate::helpers::*;

#[tokio::test]
async fn test_metrics_survive_restart() {
    let temp_dir = tempdir().unwrap();
    let path = snapshot_path(temp_dir.path());

    let store = open_periodic_store(&path).await;
    store.update("temp", MetricValue::Gauge(21.5)).await.unwrap();
    store.update("hits", MetricValue::Counter(3)).await.unwrap();
    store.update("hits", MetricValue::Counter(4)).await.unwrap();
    store.close().await.unwrap();

    let store = open_periodic_store(&path).await;
    assert_eq!(
        store.get(MetricKind::Gauge, "temp").await.unwrap(),
        MetricValue::Gauge(21.5)
    );
    assert_eq!(
        store.get(MetricKind::Counter, "hits").await.unwrap(),
        MetricValue::Counter(7)
    );

    // counters keep accumulating on top of the restored value
    store.update("hits", MetricValue::Counter(1)).await.unwrap();
    assert_eq!(
        store.get(MetricKind::Counter, "hits").await.unwrap(),
        MetricValue::Counter(8)
    );
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_restore_disabled_starts_empty() {
    let temp_dir = tempdir().unwrap();
    let path = snapshot_path(temp_dir.path());

    let store = open_sync_store(&path).await;
    store.update("hits", MetricValue::Counter(5)).await.unwrap();
    store.close().await.unwrap();

    let store = FileStore::open(
        FileStoreOptions::new(&path)
            .interval(Duration::from_secs(3600))
            .restore(false)
            .retry(fast_retry()),
    )
    .await;

    assert!(store.list().await.unwrap().is_empty());
    assert!(
        store
            .get(MetricKind::Counter, "hits")
            .await
            .unwrap_err()
            .is_not_found()
    );

    // the next snapshot replaces the old file
    store.close().await.unwrap();
    assert!(read_snapshot(store.path()).is_empty());
}

#[tokio::test]
async fn test_snapshot_is_sorted_gauges_first() {
    let temp_dir = tempdir().unwrap();
    let path = snapshot_path(temp_dir.path());

    let store = open_periodic_store(&path).await;
    store.update("zeta", MetricValue::Counter(1)).await.unwrap();
    store.update("beta", MetricValue::Gauge(2.0)).await.unwrap();
    store.update("alpha", MetricValue::Counter(3)).await.unwrap();
    store.close().await.unwrap();

    assert_eq!(
        read_snapshot(&path),
        vec![
            r#"{"id":"beta","type":"gauge","value":2.0}"#.to_string(),
            r#"{"id":"alpha","type":"counter","delta":3}"#.to_string(),
            r#"{"id":"zeta","type":"counter","delta":1}"#.to_string(),
        ]
    );
}

#[tokio::test]
async fn test_restore_sums_duplicate_counter_lines() {
    let temp_dir = tempdir().unwrap();
    let path = snapshot_path(temp_dir.path());

    std::fs::write(
        &path,
        concat!(
            r#"{"id":"hits","type":"counter","delta":2}"#,
            "\n",
            r#"{"id":"temp","type":"gauge","value":1.0}"#,
            "\n",
            r#"{"id":"hits","type":"counter","delta":5}"#,
            "\n",
            r#"{"id":"temp","type":"gauge","value":3.5}"#,
            "\n",
        ),
    )
    .unwrap();

    let store = open_periodic_store(&path).await;
    assert_eq!(
        store.get(MetricKind::Counter, "hits").await.unwrap(),
        MetricValue::Counter(7)
    );
    assert_eq!(
        store.get(MetricKind::Gauge, "temp").await.unwrap(),
        MetricValue::Gauge(3.5)
    );
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_open_through_facade() {
    let temp_dir = tempdir().unwrap();
    let config = StorageConfig {
        interval: Duration::ZERO,
        file_path: snapshot_path(temp_dir.path()),
        ..StorageConfig::default()
    };

    let store = storage::open(&config).await.unwrap();
    store.update("load", MetricValue::Gauge(0.5)).await.unwrap();

    // synchronous mode writes before the update returns
    assert_eq!(
        read_snapshot(&config.file_path),
        vec![r#"{"id":"load","type":"gauge","value":0.5}"#.to_string()]
    );

    assert_eq!(
        store.list().await.unwrap(),
        vec![NamedMetric::gauge("load", 0.5)]
    );
    store.close().await.unwrap();
}
