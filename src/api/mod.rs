//! Registration API for the checker
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Storage backend** shared with the result sink
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Storage health
//! - `POST /api/sites` - Register an endpoint
//! - `GET /api/sites` - List registered endpoints, newest first
//! - `GET /api/sites/{id}/status` - Current status derived from the latest measurement

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{
    CreateSiteRequest, CreateSiteResponse, HealthResponse, LastCheck, SiteStatusResponse,
};

use std::net::SocketAddr;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiConfig;

/// Build the router with all routes
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route(
            "/api/sites",
            get(routes::sites::list_sites).post(routes::sites::create_site),
        )
        .route("/api/sites/:id/status", get(routes::sites::get_site_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: &ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
