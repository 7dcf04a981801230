/// Disk-based media host
use crate::{
    error::{ApiError, ApiResult},
    media::{MediaHost, RemoteAsset},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Stores uploaded media in a local directory and serves it from `public_url`
///
/// Files are sharded by the first two characters of their public id so no
/// single directory grows without bound.
#[derive(Clone)]
pub struct DiskMediaHost {
    base_path: PathBuf,
    public_url: String,
}

impl DiskMediaHost {
    /// Create a new disk media host
    pub fn new(base_path: PathBuf, public_url: impl Into<String>) -> Self {
        Self {
            base_path,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Relative location of an asset: {first2chars}/{public_id}
    fn relative_path(public_id: &str) -> Option<PathBuf> {
        // Public ids are generated here; anything else is not ours to touch
        if public_id.len() < 2
            || !public_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
            || public_id.starts_with('.')
        {
            return None;
        }
        Some(PathBuf::from(&public_id[0..2]).join(public_id))
    }

    fn asset_path(&self, public_id: &str) -> Option<PathBuf> {
        Self::relative_path(public_id).map(|rel| self.base_path.join(rel))
    }
}

#[async_trait]
impl MediaHost for DiskMediaHost {
    async fn upload(&self, local_path: &Path) -> ApiResult<RemoteAsset> {
        let data = fs::read(local_path).await.map_err(|e| {
            ApiError::UploadFailed(format!("Failed to read {}: {}", local_path.display(), e))
        })?;

        let extension = local_path
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();
        let public_id = format!("{}{}", Uuid::new_v4().simple(), extension);

        let relative = Self::relative_path(&public_id)
            .ok_or_else(|| ApiError::Internal("Generated an invalid public id".to_string()))?;
        let target = self.base_path.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&target, data).await.map_err(|e| {
            ApiError::UploadFailed(format!("Failed to write {}: {}", public_id, e))
        })?;

        Ok(RemoteAsset {
            url: format!("{}/{}/{}", self.public_url, &public_id[0..2], public_id),
            public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> ApiResult<()> {
        let Some(path) = self.asset_path(public_id) else {
            return Err(ApiError::InvalidInput(format!(
                "Not a media public id: {}",
                public_id
            )));
        };

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::Internal(format!(
                "Failed to delete media {}: {}",
                public_id, e
            ))),
        }
    }
}
