//! Health check endpoint

use axum::Json;
use axum::extract::State;

use crate::api::error::ApiResult;
use crate::api::state::ApiState;
use crate::api::types::HealthResponse;

/// GET /api/health
///
/// Reports whether the storage backend answers
pub async fn health_check(State(state): State<ApiState>) -> ApiResult<Json<HealthResponse>> {
    let health = state.storage.health_check().await?;

    Ok(Json(HealthResponse {
        status: if health.healthy { "ok" } else { "degraded" }.to_string(),
        storage: health.message,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}
