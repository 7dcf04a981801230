/// Cloudinary media host
///
/// Uses the signed REST upload API directly over `reqwest`. Requests are
/// signed with SHA-256 over the alphabetically sorted parameters followed by
/// the API secret.
use crate::{
    error::{ApiError, ApiResult},
    media::{MediaHost, RemoteAsset},
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error};

/// Credentials and endpoint for a Cloudinary account
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Defaults to https://api.cloudinary.com/v1_1
    pub api_base_url: String,
    pub timeout: Duration,
}

/// Cloudinary-backed media host
#[derive(Clone)]
pub struct CloudinaryMediaHost {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl CloudinaryMediaHost {
    /// Create a new Cloudinary media host
    pub fn new(config: CloudinaryConfig) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/image/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.cloud_name,
            action
        )
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorResponse>().await {
            Ok(body) => format!("{}: {}", status, body.error.message),
            Err(_) => status.to_string(),
        }
    }
}

/// Sign request parameters: sorted `key=value` pairs joined with `&`, then the secret
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    hex::encode(Sha256::digest(format!("{}{}", to_sign, api_secret).as_bytes()))
}

#[async_trait]
impl MediaHost for CloudinaryMediaHost {
    async fn upload(&self, local_path: &Path) -> ApiResult<RemoteAsset> {
        let data = tokio::fs::read(local_path).await.map_err(|e| {
            ApiError::UploadFailed(format!("Failed to read {}: {}", local_path.display(), e))
        })?;
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(&[("timestamp", &timestamp)], &self.config.api_secret);

        debug!("Uploading {} ({} bytes) to Cloudinary", file_name, data.len());

        let form = Form::new()
            .part("file", Part::bytes(data).file_name(file_name))
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Cloudinary upload request failed: {}", e);
                ApiError::UploadFailed(format!("Media host unreachable: {}", e))
            })?;

        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            return Err(ApiError::UploadFailed(format!(
                "Media host rejected upload: {}",
                message
            )));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| ApiError::UploadFailed(format!("Unexpected upload response: {}", e)))?;

        let url = body
            .secure_url
            .or(body.url)
            .ok_or_else(|| ApiError::UploadFailed("Upload response carried no URL".to_string()))?;

        debug!("Uploaded to Cloudinary: {}", body.public_id);
        Ok(RemoteAsset {
            url,
            public_id: body.public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> ApiResult<()> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("public_id", public_id), ("timestamp", &timestamp)],
            &self.config.api_secret,
        );

        let params = [
            ("public_id", public_id),
            ("api_key", self.config.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("signature_algorithm", "sha256"),
            ("signature", signature.as_str()),
        ];

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("Media host unreachable: {}", e)))?;

        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            return Err(ApiError::Internal(format!(
                "Media host rejected delete: {}",
                message
            )));
        }

        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Internal(format!("Unexpected delete response: {}", e)))?;

        match body.result.as_str() {
            "ok" | "not found" => {
                debug!("Deleted {} from Cloudinary ({})", public_id, body.result);
                Ok(())
            }
            other => Err(ApiError::Internal(format!(
                "Media host refused delete of {}: {}",
                public_id, other
            ))),
        }
    }
}
