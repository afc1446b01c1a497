use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
        Multipart, Path, State,
    },
    http::{HeaderMap, StatusCode},
    response::Json,
};
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, QueryOrder, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entities::project::{self, Entity as Project};
use crate::error::AppError;
use crate::services::attachments;
use crate::services::media_store::{media_url, public_base};
use crate::services::uploads::{convert_all, discard_converted, discard_uploads, read_upload_form};
use crate::state::AppState;

/// Multipart field names accepted for project images.
const IMAGE_FIELDS: &[&str] = &["images", "images[]", "image"];

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateProjectRequest {
    title: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    project_url: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProjectResponse {
    id: i32,
    title: String,
    description: Option<String>,
    project_url: Option<String>,
    image_url: Option<String>,
    /// Attached image URLs ordered by position.
    images: Vec<String>,
}

impl ProjectResponse {
    fn new(project: project::Model, images: Vec<String>) -> Self {
        Self {
            id: project.id,
            title: project.title,
            description: project.description,
            project_url: project.project_url,
            image_url: project.image_url,
            images,
        }
    }
}

async fn load_response(state: &AppState, project: project::Model) -> Result<ProjectResponse, AppError> {
    let images = attachments::project_images(&state.db, &[project.id])
        .await?
        .remove(&project.id)
        .unwrap_or_default();
    Ok(ProjectResponse::new(project, images))
}

#[utoipa::path(
    get,
    path = "/api/projects",
    responses(
        (status = 200, description = "All projects ordered by id", body = [ProjectResponse]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProjectResponse>>, AppError> {
    let projects = Project::find()
        .order_by_asc(project::Column::Id)
        .all(&state.db)
        .await?;

    let ids: Vec<i32> = projects.iter().map(|p| p.id).collect();
    let mut images = attachments::project_images(&state.db, &ids).await?;

    let responses = projects
        .into_iter()
        .map(|p| {
            let urls = images.remove(&p.id).unwrap_or_default();
            ProjectResponse::new(p, urls)
        })
        .collect();
    Ok(Json(responses))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    params(
        ("id" = i32, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Project details", body = ProjectResponse),
        (status = 404, description = "Project not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> Result<Json<ProjectResponse>, AppError> {
    let Path(project_id) = path?;
    let project = Project::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Project not found".to_string()))?;

    Ok(Json(load_response(&state, project).await?))
}

#[utoipa::path(
    post,
    path = "/api/projects",
    request_body(content = String, content_type = "multipart/form-data",
        description = "Fields: title (required), description, project_url; files: images"),
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 400, description = "Missing title or malformed form"),
        (status = 401, description = "Missing token"),
        (status = 403, description = "Invalid or expired token"),
        (status = 500, description = "Upload processing or database failure")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Projects"
)]
pub async fn create_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ProjectResponse>), AppError> {
    let mut multipart = multipart?;
    let form = read_upload_form(
        &mut multipart,
        &state.media,
        IMAGE_FIELDS,
        state.config.max_upload_files,
    )
    .await?;

    let Some(title) = form.text("title") else {
        discard_uploads(&state.media, &form.files).await;
        return Err(AppError::BadRequest("Title is required".to_string()));
    };

    let converted = convert_all(&state.converter, &state.media, &form.files).await?;
    let base = public_base(state.config.public_base_url.as_deref(), &headers);
    let urls: Vec<String> = converted.iter().map(|m| media_url(&base, &m.file_name)).collect();

    let insert = async {
        let txn = state.db.begin().await?;
        let project = project::ActiveModel {
            title: Set(title),
            description: Set(form.text("description")),
            project_url: Set(form.text("project_url")),
            image_url: Set(urls.first().cloned()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        attachments::insert_project_images(&txn, project.id, &urls).await?;
        txn.commit().await?;
        Ok::<_, sea_orm::DbErr>(project)
    }
    .await;

    let project = match insert {
        Ok(project) => project,
        Err(e) => {
            warn!(error = %e, "Project insert rolled back, removing converted files");
            discard_converted(&state.media, &converted).await;
            return Err(e.into());
        }
    };

    info!(id = project.id, images = urls.len(), "Project created");
    Ok((StatusCode::CREATED, Json(ProjectResponse::new(project, urls))))
}

#[utoipa::path(
    put,
    path = "/api/projects/{id}",
    params(
        ("id" = i32, Path, description = "Project ID")
    ),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated", body = ProjectResponse),
        (status = 400, description = "Empty title"),
        (status = 404, description = "Project not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Projects"
)]
pub async fn update_project(
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdateProjectRequest>, JsonRejection>,
) -> Result<Json<ProjectResponse>, AppError> {
    let Path(project_id) = path?;
    let Json(payload) = payload?;
    let project = Project::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Project not found".to_string()))?;

    let mut active_project = project.into_active_model();

    if let Some(title) = payload.title {
        if title.trim().is_empty() {
            return Err(AppError::BadRequest("Title cannot be empty".to_string()));
        }
        active_project.title = Set(title);
    }
    if let Some(description) = payload.description {
        active_project.description = Set(Some(description));
    }
    if let Some(image_url) = payload.image_url {
        active_project.image_url = Set(Some(image_url));
    }
    if let Some(project_url) = payload.project_url {
        active_project.project_url = Set(Some(project_url));
    }

    let updated_project = active_project.update(&state.db).await?;

    info!(id = updated_project.id, "Project updated");
    Ok(Json(load_response(&state, updated_project).await?))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    params(
        ("id" = i32, Path, description = "Project ID")
    ),
    responses(
        (status = 204, description = "Project and its image attachments deleted"),
        (status = 404, description = "Project not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Projects"
)]
pub async fn delete_project(
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(project_id) = path?;
    // attachment rows go with it through the cascading foreign key
    let result = Project::delete_by_id(project_id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Project not found".to_string()));
    }

    info!(id = project_id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}
