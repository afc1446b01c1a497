use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
        Multipart, Path, State,
    },
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entities::photo::{self, Entity as Photo};
use crate::error::AppError;
use crate::services::media_store::{media_url, public_base};
use crate::services::uploads::{discard_uploads, read_upload_form};
use crate::state::AppState;

const PHOTO_FIELD: &str = "photo";

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdatePhotoRequest {
    title: Option<String>,
    caption: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PhotoResponse {
    id: i32,
    title: Option<String>,
    caption: Option<String>,
    image_url: String,
    raw_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<photo::Model> for PhotoResponse {
    fn from(photo: photo::Model) -> Self {
        PhotoResponse {
            id: photo.id,
            title: photo.title,
            caption: photo.caption,
            image_url: photo.image_url,
            raw_url: photo.raw_url,
            created_at: photo.created_at.and_utc(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/photos",
    responses(
        (status = 200, description = "All photos, newest first", body = [PhotoResponse]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Photos"
)]
pub async fn list_photos(State(state): State<AppState>) -> Result<Json<Vec<PhotoResponse>>, AppError> {
    let photos = Photo::find()
        .order_by_desc(photo::Column::CreatedAt)
        .order_by_desc(photo::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(photos.into_iter().map(PhotoResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/photos/{id}",
    params(
        ("id" = i32, Path, description = "Photo ID")
    ),
    responses(
        (status = 200, description = "Photo details", body = PhotoResponse),
        (status = 404, description = "Photo not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Photos"
)]
pub async fn get_photo(
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> Result<Json<PhotoResponse>, AppError> {
    let Path(photo_id) = path?;
    let photo = Photo::find_by_id(photo_id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Photo not found".to_string()))?;

    Ok(Json(PhotoResponse::from(photo)))
}

#[utoipa::path(
    post,
    path = "/api/photos",
    request_body(content = String, content_type = "multipart/form-data",
        description = "Fields: title, caption; file: photo (JPEG, PNG, RAW or HEIC)"),
    responses(
        (status = 201, description = "Photo stored", body = PhotoResponse),
        (status = 400, description = "No file uploaded"),
        (status = 401, description = "Missing token"),
        (status = 403, description = "Invalid or expired token"),
        (status = 500, description = "Upload processing or database failure")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Photos"
)]
pub async fn create_photo(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<PhotoResponse>), AppError> {
    let mut multipart = multipart?;
    let form = read_upload_form(&mut multipart, &state.media, &[PHOTO_FIELD], 1).await?;

    let Some(upload) = form.files.first() else {
        return Err(AppError::BadRequest("No file uploaded".to_string()));
    };

    let converted = match state.converter.convert(upload).await {
        Ok(converted) => converted,
        Err(e) => {
            discard_uploads(&state.media, &form.files).await;
            return Err(e.into());
        }
    };

    let base = public_base(state.config.public_base_url.as_deref(), &headers);
    let image_url = media_url(&base, &converted.file_name);

    let photo = photo::ActiveModel {
        title: Set(form.text("title")),
        caption: Set(form.text("caption")),
        image_url: Set(image_url),
        // originals are never preserved once converted
        raw_url: Set(None),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };

    let photo = match photo.insert(&state.db).await {
        Ok(photo) => photo,
        Err(e) => {
            warn!(error = %e, "Photo insert failed, removing stored file");
            state.media.remove(&converted.file_name).await;
            return Err(e.into());
        }
    };

    info!(
        id = photo.id,
        original = %upload.original_name,
        converted = !converted.kept_original,
        "Photo created"
    );
    Ok((StatusCode::CREATED, Json(PhotoResponse::from(photo))))
}

#[utoipa::path(
    put,
    path = "/api/photos/{id}",
    params(
        ("id" = i32, Path, description = "Photo ID")
    ),
    request_body = UpdatePhotoRequest,
    responses(
        (status = 200, description = "Photo updated", body = PhotoResponse),
        (status = 404, description = "Photo not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Photos"
)]
pub async fn update_photo(
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdatePhotoRequest>, JsonRejection>,
) -> Result<Json<PhotoResponse>, AppError> {
    let Path(photo_id) = path?;
    let Json(payload) = payload?;
    let photo = Photo::find_by_id(photo_id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Photo not found".to_string()))?;

    let mut active_photo = photo.into_active_model();

    if let Some(title) = payload.title {
        active_photo.title = Set(Some(title));
    }
    if let Some(caption) = payload.caption {
        active_photo.caption = Set(Some(caption));
    }

    let updated_photo = active_photo.update(&state.db).await?;

    info!(id = updated_photo.id, "Photo updated");
    Ok(Json(PhotoResponse::from(updated_photo)))
}

#[utoipa::path(
    delete,
    path = "/api/photos/{id}",
    params(
        ("id" = i32, Path, description = "Photo ID")
    ),
    responses(
        (status = 204, description = "Photo deleted; backing files removed best-effort"),
        (status = 404, description = "Photo not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Photos"
)]
pub async fn delete_photo(
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(photo_id) = path?;
    let photo = Photo::find_by_id(photo_id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Photo not found".to_string()))?;

    Photo::delete_by_id(photo.id).exec(&state.db).await?;

    // the row is gone regardless of what happens to the files
    state.media.remove_url(&photo.image_url).await;
    if let Some(raw_url) = &photo.raw_url {
        state.media.remove_url(raw_url).await;
    }

    info!(id = photo.id, "Photo deleted");
    Ok(StatusCode::NO_CONTENT)
}
