use std::collections::HashMap;

use axum::extract::multipart::{Field, Multipart};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::services::converter::{ConvertedMedia, MediaConverter, StoredUpload};
use crate::services::media_store::{upload_file_name, MediaStore};

/// Multipart form with its files already written to the media store.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    pub files: Vec<StoredUpload>,
}

impl UploadForm {
    /// A text field, with blank values treated as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}

/// Reads a multipart body, streaming file parts named in `file_fields` to
/// disk. Files beyond `max_files` are dropped without error. If reading
/// fails midway, files already written are removed.
pub async fn read_upload_form(
    multipart: &mut Multipart,
    store: &MediaStore,
    file_fields: &[&str],
    max_files: usize,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    if let Err(e) = collect_fields(multipart, store, file_fields, max_files, &mut form).await {
        discard_uploads(store, &form.files).await;
        return Err(e);
    }
    Ok(form)
}

async fn collect_fields(
    multipart: &mut Multipart,
    store: &MediaStore,
    file_fields: &[&str],
    max_files: usize,
    form: &mut UploadForm,
) -> Result<(), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match field.file_name().map(str::to_string) {
            // browsers send an empty part for an untouched file input
            Some(original) if original.is_empty() => continue,
            Some(original) => {
                if !file_fields.contains(&name.as_str()) {
                    debug!(field = %name, "Ignoring unexpected file field");
                    continue;
                }
                if form.files.len() >= max_files {
                    debug!(field = %name, file = %original, max_files, "Dropping file beyond upload limit");
                    continue;
                }
                let stored = store_field(field, store, original).await?;
                form.files.push(stored);
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid form field '{}': {}", name, e)))?;
                form.fields.insert(name, value);
            }
        }
    }
    Ok(())
}

async fn store_field(
    mut field: Field<'_>,
    store: &MediaStore,
    original: String,
) -> Result<StoredUpload, AppError> {
    let content_type = field.content_type().map(str::to_string);
    let file_name = upload_file_name(&original);
    let path = store
        .path_for(&file_name)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| AppError::InternalServerError(format!("Failed to create {}: {}", path.display(), e)))?;

    let written = async {
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read uploaded file: {}", e)))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::InternalServerError(format!("Failed to write upload: {}", e)))?;
        }
        file.flush()
            .await
            .map_err(|e| AppError::InternalServerError(format!("Failed to write upload: {}", e)))
    }
    .await;

    if let Err(e) = written {
        drop(file);
        store.remove(&file_name).await;
        return Err(e);
    }

    debug!(file = %file_name, original = %original, "Stored upload");
    Ok(StoredUpload {
        file_name,
        original_name: original,
        content_type,
    })
}

/// Converts every upload in order. On the first failure, everything this
/// request wrote (converted outputs and remaining originals) is removed.
pub async fn convert_all(
    converter: &MediaConverter,
    store: &MediaStore,
    uploads: &[StoredUpload],
) -> Result<Vec<ConvertedMedia>, AppError> {
    let mut converted: Vec<ConvertedMedia> = Vec::with_capacity(uploads.len());
    for (index, upload) in uploads.iter().enumerate() {
        match converter.convert(upload).await {
            Ok(media) => converted.push(media),
            Err(e) => {
                warn!(file = %upload.original_name, error = %e, "Conversion failed, discarding request uploads");
                discard_converted(store, &converted).await;
                discard_uploads(store, &uploads[index..]).await;
                return Err(e.into());
            }
        }
    }
    Ok(converted)
}

pub async fn discard_uploads(store: &MediaStore, uploads: &[StoredUpload]) {
    for upload in uploads {
        store.remove(&upload.file_name).await;
    }
}

pub async fn discard_converted(store: &MediaStore, converted: &[ConvertedMedia]) {
    for media in converted {
        store.remove(&media.file_name).await;
    }
}
