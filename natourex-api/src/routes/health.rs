/// Health check endpoint
///
/// Provides a simple health check endpoint that verifies:
/// - The server is running
/// - The storage backend answers
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "backend": "postgres",
///   "database": "connected",
///   "requestedAt": "2026-10-16T09:30:00Z"
/// }
/// ```

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{app::AppState, error::ApiResult, middleware::request_time::RequestTime};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Storage backend name
    pub backend: String,

    /// Storage status
    pub database: String,

    /// When the request reached the router
    pub requested_at: Option<DateTime<Utc>>,
}

/// Health check handler
///
/// Returns `degraded` when the storage backend does not answer.
pub async fn health_check(
    State(state): State<AppState>,
    requested_at: Option<Extension<RequestTime>>,
) -> ApiResult<Json<HealthResponse>> {
    let database_status = match state.repos.health.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Health check ping failed");
            "disconnected"
        }
    };

    Ok(Json(HealthResponse {
        status: if database_status == "connected" {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.repos.health.backend().to_string(),
        database: database_status.to_string(),
        requested_at: requested_at.map(|Extension(RequestTime(at))| at),
    }))
}
