use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::entities::{blog_image, project_image};

/// Ordered image URLs per project, by position then id.
pub async fn project_images<C: ConnectionTrait>(
    db: &C,
    project_ids: &[i32],
) -> Result<HashMap<i32, Vec<String>>, DbErr> {
    let rows = project_image::Entity::find()
        .filter(project_image::Column::ProjectId.is_in(project_ids.iter().copied()))
        .order_by_asc(project_image::Column::Position)
        .order_by_asc(project_image::Column::Id)
        .all(db)
        .await?;

    Ok(group(rows.into_iter().map(|r| (r.project_id, r.image_url))))
}

/// Ordered image URLs per blog, by position then id.
pub async fn blog_images<C: ConnectionTrait>(
    db: &C,
    blog_ids: &[i32],
) -> Result<HashMap<i32, Vec<String>>, DbErr> {
    let rows = blog_image::Entity::find()
        .filter(blog_image::Column::BlogId.is_in(blog_ids.iter().copied()))
        .order_by_asc(blog_image::Column::Position)
        .order_by_asc(blog_image::Column::Id)
        .all(db)
        .await?;

    Ok(group(rows.into_iter().map(|r| (r.blog_id, r.image_url))))
}

fn group(rows: impl Iterator<Item = (i32, String)>) -> HashMap<i32, Vec<String>> {
    let mut grouped: HashMap<i32, Vec<String>> = HashMap::new();
    for (owner, url) in rows {
        grouped.entry(owner).or_default().push(url);
    }
    grouped
}

pub async fn insert_project_images<C: ConnectionTrait>(
    db: &C,
    project_id: i32,
    urls: &[String],
) -> Result<(), DbErr> {
    if urls.is_empty() {
        return Ok(());
    }
    let rows: Vec<project_image::ActiveModel> = urls
        .iter()
        .enumerate()
        .map(|(position, url)| project_image::ActiveModel {
            project_id: Set(project_id),
            image_url: Set(url.clone()),
            position: Set(position as i32),
            ..Default::default()
        })
        .collect();
    project_image::Entity::insert_many(rows).exec(db).await?;
    Ok(())
}

pub async fn insert_blog_images<C: ConnectionTrait>(
    db: &C,
    blog_id: i32,
    urls: &[String],
) -> Result<(), DbErr> {
    if urls.is_empty() {
        return Ok(());
    }
    let rows: Vec<blog_image::ActiveModel> = urls
        .iter()
        .enumerate()
        .map(|(position, url)| blog_image::ActiveModel {
            blog_id: Set(blog_id),
            image_url: Set(url.clone()),
            position: Set(position as i32),
            ..Default::default()
        })
        .collect();
    blog_image::Entity::insert_many(rows).exec(db).await?;
    Ok(())
}
