//! Metric lookup endpoints

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
    },
    metrics::{JsonMetric, MetricKind, NamedMetric},
};

/// GET /value/{type}/{name}
///
/// Returns the textual rendering of the value
pub async fn value_from_path(
    State(state): State<ApiState>,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult<String> {
    // a metric of an unknown type cannot exist
    let kind: MetricKind = kind
        .parse()
        .map_err(|e: crate::metrics::MetricError| ApiError::NotFound(e.to_string()))?;

    let value = state.storage.get(kind, &name).await?;

    Ok(value.to_string())
}

/// POST /value/
///
/// Returns the metric as JSON, or the lookup key with 404 if it is unknown
pub async fn value_json(
    State(state): State<ApiState>,
    Json(body): Json<JsonMetric>,
) -> ApiResult<Response> {
    let not_found = |body: JsonMetric| {
        let key = JsonMetric {
            delta: None,
            value: None,
            ..body
        };
        (StatusCode::NOT_FOUND, Json(key)).into_response()
    };

    let Ok(kind) = body.kind.parse::<MetricKind>() else {
        return Ok(not_found(body));
    };

    match state.storage.get(kind, &body.id).await {
        Ok(value) => {
            let metric = NamedMetric::new(body.id, value);
            Ok(Json(JsonMetric::from_named(&metric)).into_response())
        }
        Err(e) if e.is_not_found() => Ok(not_found(body)),
        Err(e) => Err(e.into()),
    }
}
