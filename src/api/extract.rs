/// Request body extractors that reject with the JSON error envelope
use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::{header, HeaderMap},
    Form, Json,
};
use serde::de::DeserializeOwned;

/// Body read as `application/x-www-form-urlencoded` when the request says so,
/// otherwise as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOrForm<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form_encoded(req.headers()) {
            let Form(value) = Form::<T>::from_request(req, state).await?;
            Ok(JsonOrForm(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state).await?;
            Ok(JsonOrForm(value))
        }
    }
}

fn is_form_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}
