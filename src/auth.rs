/// Authentication extractors
use crate::{
    api::middleware::{extract_access_token, ACCESS_TOKEN_COOKIE},
    context::AppContext,
    error::ApiError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated caller, taken from a verified access token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        // Cookie first, then Authorization header
        let token = extract_access_token(&parts.headers).ok_or_else(|| {
            ApiError::Unauthorized(format!(
                "Missing {} cookie or bearer token",
                ACCESS_TOKEN_COOKIE
            ))
        })?;

        let claims = state.tokens.verify_access(&token).map_err(|e| {
            tracing::debug!(error = %e, "access token rejected");
            e
        })?;

        Ok(AuthContext {
            user_id: claims.sub,
        })
    }
}
