use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, Set, TransactionTrait};
use tracing::info;

use crate::entities::project;

const DEMO_PROJECTS: &[(&str, &str)] = &[
    (
        "OffCampus Clark",
        "Apartment Listing website built for the Clark University Department of Residential Life and Housing",
    ),
    (
        "AI Research Project",
        "A project exploring machine learning models for natural language understanding.",
    ),
    (
        "Personal Blog Engine",
        "A lightweight, custom-built blog platform using Node.js and Markdown.",
    ),
];

/// Inserts the demo projects when the projects table is empty.
/// Returns how many rows were inserted.
pub async fn seed_projects(db: &DatabaseConnection) -> Result<usize, DbErr> {
    if project::Entity::find().count(db).await? > 0 {
        info!("Projects table already populated, skipping seed");
        return Ok(0);
    }

    let txn = db.begin().await?;
    for (title, description) in DEMO_PROJECTS {
        project::ActiveModel {
            title: Set(title.to_string()),
            description: Set(Some(description.to_string())),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    info!(count = DEMO_PROJECTS.len(), "Database seeded with demo projects");
    Ok(DEMO_PROJECTS.len())
}
