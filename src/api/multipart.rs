/// Multipart form staging
///
/// File parts are streamed into the staging directory under random names and
/// handed to the account layer as `StagedUpload`s. Text parts are collected
/// by name. Each accepted file field may appear at most once. Staged files
/// are owned by their `StagedUpload`, so a rejected or abandoned form leaves
/// nothing behind.
use crate::{
    error::{ApiError, ApiResult},
    media::StagedUpload,
};
use axum::extract::{multipart::Field, Multipart};
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// A parsed multipart form with its files already on disk
#[derive(Debug, Default)]
pub struct StagedForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<StagedUpload>,
}

impl StagedForm {
    /// Text value of a field, empty when absent
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Take the staged file for a field
    pub fn take_file(&mut self, field: &str) -> Option<StagedUpload> {
        let index = self.files.iter().position(|f| f.field == field)?;
        Some(self.files.swap_remove(index))
    }
}

/// Read the whole form, staging parts named in `file_fields` under `staging_dir`
pub async fn stage_form(
    mut multipart: Multipart,
    staging_dir: &Path,
    file_fields: &[&str],
) -> ApiResult<StagedForm> {
    let mut form = StagedForm::default();

    while let Some(field) = multipart.next_field().await? {
        read_field(field, &mut form, staging_dir, file_fields).await?;
    }

    Ok(form)
}

async fn read_field(
    field: Field<'_>,
    form: &mut StagedForm,
    staging_dir: &Path,
    file_fields: &[&str],
) -> ApiResult<()> {
    let name = field.name().unwrap_or_default().to_string();

    if field.file_name().is_none() {
        let value = field.text().await?;
        form.fields.insert(name, value);
        return Ok(());
    }

    if !file_fields.contains(&name.as_str()) {
        return Err(ApiError::InvalidInput(format!("Unexpected file field: {}", name)));
    }
    if form.files.iter().any(|f| f.field == name) {
        return Err(ApiError::InvalidInput(format!("Only one {} file is allowed", name)));
    }

    let staged = stage_file(field, name, staging_dir).await?;
    form.files.push(staged);
    Ok(())
}

async fn stage_file(
    mut field: Field<'_>,
    name: String,
    staging_dir: &Path,
) -> ApiResult<StagedUpload> {
    let original_name = field.file_name().map(str::to_string);
    let extension = original_name
        .as_deref()
        .and_then(|n| Path::new(n).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();

    tokio::fs::create_dir_all(staging_dir).await?;

    // From here on the guard removes the file on every early return
    let staged = StagedUpload {
        path: staging_dir.join(format!("{}-{}{}", name, Uuid::new_v4().simple(), extension)),
        field: name,
        original_name,
    };

    let mut file = tokio::fs::File::create(&staged.path).await?;
    let mut size = 0usize;
    while let Some(chunk) = field.chunk().await? {
        size += chunk.len();
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    if size == 0 {
        return Err(ApiError::InvalidInput(format!("{} file is empty", staged.field)));
    }

    tracing::debug!(
        field = %staged.field,
        size,
        path = %staged.path.display(),
        "staged upload"
    );
    Ok(staged)
}
