/// HTTP server setup and routing
use crate::{
    config::MediaConfig,
    context::AppContext,
    error::{ApiError, ApiResult, ErrorEnvelope},
    metrics,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let cors = cors_layer(ctx.config.service.cors_origin.as_deref());
    let upload_limit = ctx.config.service.upload_limit;

    let mut router = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(crate::api::routes());

    // Disk-hosted media is served by this process
    if let MediaConfig::Disk { location, .. } = &ctx.config.media {
        router = router.nest_service("/media", ServeDir::new(location));
    }

    router
        .with_state(ctx)
        .fallback(not_found)
        // Over-limit bodies surface as extractor rejections in the error envelope
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// CORS for the configured origin with credentials, or any origin without
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => base.allow_origin(origin).allow_credentials(true),
        Some(Err(e)) => {
            warn!("Ignoring invalid CORS_ORIGIN: {}", e);
            base.allow_origin(Any)
        }
        None => base.allow_origin(Any),
    }
}

/// Prometheus text exposition
async fn metrics_handler() -> ([(header::HeaderName, &'static str); 1], String) {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<ErrorEnvelope>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorEnvelope {
            status_code: StatusCode::NOT_FOUND.as_u16(),
            error: "NotFound".to_string(),
            message: "Endpoint not found".to_string(),
            success: false,
        }),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> ApiResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Account service listening on {}", addr);
    info!("   Service URL: {}", ctx.service_url());
    info!("   Environment: {}", ctx.config.service.environment);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
