//! Endpoint registration and status

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use reqwest::Url;
use tracing::info;

use crate::Endpoint;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::ApiState;
use crate::api::types::{CreateSiteRequest, CreateSiteResponse, SiteStatusResponse};
use crate::storage::EndpointStatus;

/// Accept only absolute http(s) URLs
fn validate_url(raw: &str) -> ApiResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidRequest("url must not be empty".to_string()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid url '{trimmed}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::InvalidRequest(format!(
            "unsupported scheme '{}', expected http or https",
            url.scheme()
        )));
    }

    Ok(trimmed.to_string())
}

/// POST /api/sites
///
/// Register an endpoint; it is checked from the next cycle on
pub async fn create_site(
    State(state): State<ApiState>,
    payload: Result<Json<CreateSiteRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateSiteResponse>)> {
    let Json(request) = payload?;
    let url = validate_url(&request.url)?;

    let endpoint = state.storage.insert_endpoint(&url).await?;
    info!("registered site {} ({})", endpoint.id, endpoint.url);

    Ok((
        StatusCode::CREATED,
        Json(CreateSiteResponse { id: endpoint.id }),
    ))
}

/// GET /api/sites
pub async fn list_sites(State(state): State<ApiState>) -> ApiResult<Json<Vec<Endpoint>>> {
    Ok(Json(state.storage.list_endpoints().await?))
}

/// GET /api/sites/:id/status
///
/// Current status is whatever the most recent measurement says
pub async fn get_site_status(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SiteStatusResponse>> {
    let site = state
        .storage
        .get_endpoint(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("site {id} not found")))?;

    let latest = state.storage.latest_measurement(id).await?;

    Ok(Json(SiteStatusResponse {
        site,
        status: EndpointStatus::from_latest(latest.as_ref()),
        last_check: latest.map(Into::into),
    }))
}
