/// Upload orchestration: staged file → media host → local cleanup
use crate::{
    error::{ApiError, ApiResult},
    media::{MediaHost, RemoteAsset, StagedUpload},
    metrics,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Moves staged files to the media host and undoes uploads on request
#[derive(Clone)]
pub struct UploadOrchestrator {
    host: Arc<dyn MediaHost>,
}

impl UploadOrchestrator {
    pub fn new(host: Arc<dyn MediaHost>) -> Self {
        Self { host }
    }

    /// Transfer a staged file to the media host.
    ///
    /// The local file is removed whether or not the transfer succeeds, and
    /// also when this future is dropped mid-transfer. Host errors are logged
    /// and replaced by a generic `UploadFailed`.
    pub async fn upload(&self, staged: StagedUpload) -> ApiResult<RemoteAsset> {
        let field = staged.field.clone();
        if staged.path.as_os_str().is_empty() {
            metrics::record_media_upload(&field, false);
            return Err(ApiError::UploadFailed(format!("No {} file to upload", field)));
        }

        debug!(
            field = %field,
            original_name = ?staged.original_name,
            "uploading staged file"
        );
        let result = self.host.upload(&staged.path).await;
        drop(staged);

        match result {
            Ok(asset) => {
                metrics::record_media_upload(&field, true);
                info!(field = %field, public_id = %asset.public_id, "uploaded to media host");
                Ok(asset)
            }
            Err(e) => {
                metrics::record_media_upload(&field, false);
                warn!(field = %field, error = %e, "media upload failed");
                Err(ApiError::UploadFailed(format!("Failed to upload {}", field)))
            }
        }
    }

    /// Best-effort delete of a remote asset. Never fails; failures are logged
    /// and counted so orphaned assets can be found later.
    pub async fn remove(&self, public_id: &str) {
        match self.host.destroy(public_id).await {
            Ok(()) => {
                metrics::record_media_rollback(true);
                info!(public_id, "deleted remote asset");
            }
            Err(e) => {
                metrics::record_media_rollback(false);
                warn!(public_id, error = %e, "failed to delete remote asset, it is now orphaned");
            }
        }
    }

    /// Remove every asset uploaded by a failed operation
    pub async fn compensate(&self, assets: &[RemoteAsset]) {
        for asset in assets {
            self.remove(&asset.public_id).await;
        }
    }

    /// Drop a staged file that will never be uploaded
    pub async fn discard(&self, staged: StagedUpload) {
        debug!(field = %staged.field, "discarding staged upload");
        drop(staged);
    }
}
