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
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, QueryOrder, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entities::blog::{self, Entity as Blog};
use crate::error::AppError;
use crate::services::attachments;
use crate::services::media_store::{media_url, public_base};
use crate::services::uploads::{convert_all, discard_converted, discard_uploads, read_upload_form};
use crate::state::AppState;

const IMAGE_FIELDS: &[&str] = &["images", "images[]", "image"];

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateBlogRequest {
    title: Option<String>,
    content: Option<String>,
    image_url: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct BlogResponse {
    id: i32,
    title: String,
    content: Option<String>,
    date: DateTime<Utc>,
    image_url: Option<String>,
    images: Vec<String>,
}

impl BlogResponse {
    fn new(blog: blog::Model, images: Vec<String>) -> Self {
        Self {
            id: blog.id,
            title: blog.title,
            content: blog.content,
            date: blog.date.and_utc(),
            image_url: blog.image_url,
            images,
        }
    }
}

async fn load_response(state: &AppState, blog: blog::Model) -> Result<BlogResponse, AppError> {
    let images = attachments::blog_images(&state.db, &[blog.id])
        .await?
        .remove(&blog.id)
        .unwrap_or_default();
    Ok(BlogResponse::new(blog, images))
}

#[utoipa::path(
    get,
    path = "/api/blogs",
    responses(
        (status = 200, description = "All blogs, newest first", body = [BlogResponse]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Blogs"
)]
pub async fn list_blogs(State(state): State<AppState>) -> Result<Json<Vec<BlogResponse>>, AppError> {
    let blogs = Blog::find()
        .order_by_desc(blog::Column::Date)
        .order_by_desc(blog::Column::Id)
        .all(&state.db)
        .await?;

    let ids: Vec<i32> = blogs.iter().map(|b| b.id).collect();
    let mut images = attachments::blog_images(&state.db, &ids).await?;

    Ok(Json(
        blogs
            .into_iter()
            .map(|b| {
                let urls = images.remove(&b.id).unwrap_or_default();
                BlogResponse::new(b, urls)
            })
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/blogs/{id}",
    params(
        ("id" = i32, Path, description = "Blog ID")
    ),
    responses(
        (status = 200, description = "Blog details", body = BlogResponse),
        (status = 404, description = "Blog not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Blogs"
)]
pub async fn get_blog(
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> Result<Json<BlogResponse>, AppError> {
    let Path(blog_id) = path?;
    let blog = Blog::find_by_id(blog_id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Blog not found".to_string()))?;

    Ok(Json(load_response(&state, blog).await?))
}

#[utoipa::path(
    post,
    path = "/api/blogs",
    request_body(content = String, content_type = "multipart/form-data",
        description = "Fields: title (required), content; files: images or image"),
    responses(
        (status = 201, description = "Blog created", body = BlogResponse),
        (status = 400, description = "Missing title or malformed form"),
        (status = 401, description = "Missing token"),
        (status = 403, description = "Invalid or expired token"),
        (status = 500, description = "Upload processing or database failure")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Blogs"
)]
pub async fn create_blog(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<BlogResponse>), AppError> {
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
        let blog = blog::ActiveModel {
            title: Set(title),
            content: Set(form.text("content")),
            date: Set(Utc::now().naive_utc()),
            image_url: Set(urls.first().cloned()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        attachments::insert_blog_images(&txn, blog.id, &urls).await?;
        txn.commit().await?;
        Ok::<_, sea_orm::DbErr>(blog)
    }
    .await;

    let blog = match insert {
        Ok(blog) => blog,
        Err(e) => {
            warn!(error = %e, "Blog insert rolled back, removing converted files");
            discard_converted(&state.media, &converted).await;
            return Err(e.into());
        }
    };

    info!(id = blog.id, images = urls.len(), "Blog created");
    Ok((StatusCode::CREATED, Json(BlogResponse::new(blog, urls))))
}

#[utoipa::path(
    put,
    path = "/api/blogs/{id}",
    params(
        ("id" = i32, Path, description = "Blog ID")
    ),
    request_body = UpdateBlogRequest,
    responses(
        (status = 200, description = "Blog updated, date refreshed", body = BlogResponse),
        (status = 400, description = "Empty title"),
        (status = 404, description = "Blog not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Blogs"
)]
pub async fn update_blog(
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdateBlogRequest>, JsonRejection>,
) -> Result<Json<BlogResponse>, AppError> {
    let Path(blog_id) = path?;
    let Json(payload) = payload?;
    let blog = Blog::find_by_id(blog_id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Blog not found".to_string()))?;

    let mut active_blog = blog.into_active_model();

    if let Some(title) = payload.title {
        if title.trim().is_empty() {
            return Err(AppError::BadRequest("Title cannot be empty".to_string()));
        }
        active_blog.title = Set(title);
    }
    if let Some(content) = payload.content {
        active_blog.content = Set(Some(content));
    }
    if let Some(image_url) = payload.image_url {
        active_blog.image_url = Set(Some(image_url));
    }
    active_blog.date = Set(Utc::now().naive_utc());

    let updated_blog = active_blog.update(&state.db).await?;

    info!(id = updated_blog.id, "Blog updated");
    Ok(Json(load_response(&state, updated_blog).await?))
}

#[utoipa::path(
    delete,
    path = "/api/blogs/{id}",
    params(
        ("id" = i32, Path, description = "Blog ID")
    ),
    responses(
        (status = 204, description = "Blog and its image attachments deleted"),
        (status = 404, description = "Blog not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Blogs"
)]
pub async fn delete_blog(
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(blog_id) = path?;
    let result = Blog::delete_by_id(blog_id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Blog not found".to_string()));
    }

    info!(id = blog_id, "Blog deleted");
    Ok(StatusCode::NO_CONTENT)
}
