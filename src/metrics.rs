/// Metrics for the account service
///
/// Prometheus counters for account activity, token rotation and media
/// host traffic, including the compensation deletes that can leave orphans.

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

lazy_static! {
    // ========== Account Metrics ==========

    /// Account creations by outcome
    pub static ref ACCOUNT_CREATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "account_creations_total",
        "Total number of registration attempts",
        &["status"]
    )
    .unwrap();

    /// Logins by outcome
    pub static ref LOGINS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "logins_total",
        "Total number of login attempts",
        &["status"]
    )
    .unwrap();

    /// Refresh token exchanges by outcome
    pub static ref TOKEN_REFRESHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "token_refreshes_total",
        "Total number of refresh token exchanges",
        &["outcome"]
    )
    .unwrap();

    // ========== Media Metrics ==========

    /// Media uploads by form field and status
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "media_uploads_total",
        "Total number of uploads to the media host",
        &["field", "status"]
    )
    .unwrap();

    /// Remote asset deletions issued as compensation or replacement cleanup
    pub static ref MEDIA_ROLLBACKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "media_rollbacks_total",
        "Total number of remote asset deletions",
        &["status"]
    )
    .unwrap();

    // ========== Error Metrics ==========

    /// Errors returned to clients by error code
    pub static ref ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "errors_total",
        "Total number of error responses",
        &["error_type"]
    )
    .unwrap();
}

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record a registration attempt
pub fn record_account_creation(success: bool) {
    ACCOUNT_CREATIONS_TOTAL
        .with_label_values(&[status_label(success)])
        .inc();
}

/// Record a login attempt
pub fn record_login(success: bool) {
    LOGINS_TOTAL.with_label_values(&[status_label(success)]).inc();
}

/// Record a refresh token exchange
pub fn record_token_refresh(outcome: &str) {
    TOKEN_REFRESHES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record an upload to the media host
pub fn record_media_upload(field: &str, success: bool) {
    MEDIA_UPLOADS_TOTAL
        .with_label_values(&[field, status_label(success)])
        .inc();
}

/// Record a remote asset deletion
pub fn record_media_rollback(success: bool) {
    MEDIA_ROLLBACKS_TOTAL
        .with_label_values(&[status_label(success)])
        .inc();
}

/// Record an error response
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
