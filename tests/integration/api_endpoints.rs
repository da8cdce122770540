//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Path and JSON updates are applied with the right merge semantics
//! - Lookups return text, JSON, or 404 for unknown metrics
//! - Bulk updates and ping answer 409 without a database
//! - The HTML listing shows gauges before counters

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use metric_store::api::{ApiConfig, ApiState, spawn_api_server};
use metric_store::metrics::{JsonMetric, MetricKind, MetricValue};
use metric_store::storage::{MemoryStore, Storage};
use serde_json::{Value, json};

async fn spawn_test_api(storage: Arc<dyn Storage>) -> SocketAddr {
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".to_string(), // Random port
    };

    spawn_api_server(config, ApiState::new(storage)).await.unwrap()
}

async fn spawn_memory_api() -> SocketAddr {
    spawn_test_api(Arc::new(MemoryStore::new())).await
}

#[tokio::test]
async fn test_path_update_and_text_lookup() {
    let addr = spawn_memory_api().await;
    let client = reqwest::Client::new();

    for delta in [5, 3] {
        let response = client
            .post(format!("http://{addr}/update/counter/hits/{delta}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = client
        .get(format!("http://{addr}/value/counter/hits"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "8");

    client
        .post(format!("http://{addr}/update/gauge/temp/19.5"))
        .send()
        .await
        .unwrap();
    let response = client
        .get(format!("http://{addr}/value/gauge/temp"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "19.5");
}

#[tokio::test]
async fn test_path_update_rejects_bad_input() {
    let addr = spawn_memory_api().await;
    let client = reqwest::Client::new();

    for url in [
        "update/counter/hits/1.5",
        "update/gauge/temp/warm",
        "update/histogram/x/1",
    ] {
        let response = client
            .post(format!("http://{addr}/{url}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{url}");
    }
}

#[tokio::test]
async fn test_unknown_metric_is_not_found() {
    let addr = spawn_memory_api().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/value/gauge/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .get(format!("http://{addr}/value/histogram/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .post(format!("http://{addr}/value/"))
        .json(&json!({"id": "missing", "type": "counter"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"id": "missing", "type": "counter"}));
}

#[tokio::test]
async fn test_json_update_returns_stored_value() {
    let addr = spawn_memory_api().await;
    let client = reqwest::Client::new();

    for delta in [2, 4] {
        let response = client
            .post(format!("http://{addr}/update/"))
            .json(&json!({"id": "hits", "type": "counter", "delta": delta}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = client
        .post(format!("http://{addr}/value/"))
        .json(&JsonMetric::key(MetricKind::Counter, "hits"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"id": "hits", "type": "counter", "delta": 6}));

    let response = client
        .post(format!("http://{addr}/update/"))
        .json(&json!({"id": "temp", "type": "gauge", "value": 7.25}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"id": "temp", "type": "gauge", "value": 7.25}));
}

#[tokio::test]
async fn test_json_update_missing_field() {
    let addr = spawn_memory_api().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/update/"))
        .json(&json!({"id": "temp", "type": "gauge", "delta": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_database_only_endpoints_conflict_on_memory() {
    let addr = spawn_memory_api().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(format!("http://{addr}/updates/"))
        .json(&json!([{"id": "hits", "type": "counter", "delta": 1}]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_root_lists_gauges_first() {
    let storage = Arc::new(MemoryStore::new());
    let addr = spawn_test_api(storage.clone()).await;

    storage
        .update("aaa", MetricValue::Counter(1))
        .await
        .unwrap();
    storage
        .update("zzz", MetricValue::Gauge(2.5))
        .await
        .unwrap();

    let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );

    let page = response.text().await.unwrap();
    let gauge = page.find("<li>zzz (gauge): 2.5</li>").unwrap();
    let counter = page.find("<li>aaa (counter): 1</li>").unwrap();
    assert!(gauge < counter);
}

#[cfg(feature = "database")]
mod with_database {
    use super::*;
    use crate::helpers::{fast_retry, sqlite_dsn};
    use metric_store::storage::database::DatabaseStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_ping_and_bulk_update() {
        let temp_dir = tempdir().unwrap();
        let store = DatabaseStore::connect_with(&sqlite_dsn(temp_dir.path()), fast_retry())
            .await
            .unwrap();
        let addr = spawn_test_api(Arc::new(store)).await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("http://{addr}/ping"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // the malformed entry is skipped, the rest is applied
        let response = client
            .post(format!("http://{addr}/updates/"))
            .json(&json!([
                {"id": "hits", "type": "counter", "delta": 4},
                {"id": "temp", "type": "gauge", "value": 1.5},
                {"id": "bad", "type": "gauge"},
                {"id": "hits", "type": "counter", "delta": 1},
            ]))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let text = client
            .get(format!("http://{addr}/value/counter/hits"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(text, "5");

        let response = client
            .get(format!("http://{addr}/value/gauge/bad"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = client
            .post(format!("http://{addr}/updates/"))
            .json(&json!([{"id": "bad", "type": "gauge"}]))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
