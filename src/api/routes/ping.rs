//! Storage health check

use axum::{extract::State, http::StatusCode};

use crate::{
    api::{error::ApiResult, state::ApiState},
    storage,
};

/// GET /ping
///
/// 200 when the database answers, 409 when the storage has no database
pub async fn ping(State(state): State<ApiState>) -> ApiResult<StatusCode> {
    storage::ping(state.storage.as_ref()).await?;
    Ok(StatusCode::OK)
}
