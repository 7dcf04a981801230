/// Media hosting for avatar and cover images
///
/// Files arrive staged on local disk, are pushed to a media host, and come
/// back as remote assets identified by a URL and a deletable public id.

pub mod cloudinary;
pub mod disk;
pub mod uploader;

pub use uploader::UploadOrchestrator;

use crate::error::ApiResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Media host backend trait
///
/// Implementations transfer a local file to remote storage and delete remote
/// objects by public id. Deleting an absent object must succeed.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Upload the file at `local_path` and return where it now lives
    async fn upload(&self, local_path: &Path) -> ApiResult<RemoteAsset>;

    /// Delete a previously uploaded object
    async fn destroy(&self, public_id: &str) -> ApiResult<()>;
}

/// An object stored on the media host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAsset {
    pub url: String,
    pub public_id: String,
}

/// A file part written to the staging directory, waiting for upload
///
/// Owns the local file: it is deleted when the value is dropped, so an
/// abandoned request never leaves it behind.
#[derive(Debug)]
pub struct StagedUpload {
    /// Form field the file came from ("avatar", "coverImage")
    pub field: String,
    pub path: PathBuf,
    pub original_name: Option<String>,
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "removed staged file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove staged file"
            ),
        }
    }
}
