//! Metric update endpoints

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{debug, instrument};

use crate::{
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
    },
    metrics::{JsonMetric, MetricValue, NamedMetric},
    storage,
};

/// POST /update/{type}/{name}/{value}
#[instrument(skip(state))]
pub async fn update_from_path(
    State(state): State<ApiState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    let value = MetricValue::parse(&kind, &value)?;
    state.storage.update(&name, value).await?;

    Ok(StatusCode::OK)
}

/// POST /update/
///
/// Responds with the stored value after the merge
#[instrument(skip_all)]
pub async fn update_json(
    State(state): State<ApiState>,
    Json(body): Json<JsonMetric>,
) -> ApiResult<Json<JsonMetric>> {
    let metric = body.into_named()?;
    state.storage.update(&metric.name, metric.value).await?;

    let stored = state.storage.get(metric.kind(), &metric.name).await?;

    Ok(Json(JsonMetric::from_named(&NamedMetric::new(
        metric.name,
        stored,
    ))))
}

/// POST /updates/
///
/// Applies the batch atomically. Entries that cannot be decoded are skipped.
#[instrument(skip_all, fields(count = body.len()))]
pub async fn bulk_update(
    State(state): State<ApiState>,
    Json(body): Json<Vec<JsonMetric>>,
) -> ApiResult<StatusCode> {
    if state.storage.as_bulk_update().is_none() {
        return Err(ApiError::Conflict(
            "storage does not support bulk updates".to_string(),
        ));
    }

    let metrics: Vec<NamedMetric> = body
        .into_iter()
        .filter_map(|json| {
            json.into_named()
                .inspect_err(|e| debug!("skipping metric: {e}"))
                .ok()
        })
        .collect();

    if metrics.is_empty() {
        return Err(ApiError::InvalidRequest(
            "no valid metrics supplied".to_string(),
        ));
    }

    storage::bulk_update(state.storage.as_ref(), &metrics).await?;

    Ok(StatusCode::OK)
}
