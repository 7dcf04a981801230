/// Health check endpoints
///
/// `/health` answers as long as the process is up. `/api/v1/healthcheck`
/// also checks database connectivity and returns 503 when it is down.
use crate::{api::ApiResponse, context::AppContext, db};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;

/// Health status payload
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// "healthy" or "unhealthy"
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/api/v1/healthcheck", get(healthcheck))
}

/// Basic liveness check
pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness check including the database
pub async fn healthcheck(State(ctx): State<AppContext>) -> ApiResponse<HealthStatus> {
    match db::test_connection(&ctx.db).await {
        Ok(()) => ApiResponse::ok(
            HealthStatus {
                status: "healthy".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                error: None,
            },
            "Health check passed",
        ),
        Err(e) => {
            tracing::warn!(error = %e, "healthcheck failed: database unreachable");
            ApiResponse::new(
                StatusCode::SERVICE_UNAVAILABLE,
                HealthStatus {
                    status: "unhealthy".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    error: Some("database unreachable".to_string()),
                },
                "Health check failed",
            )
        }
    }
}
