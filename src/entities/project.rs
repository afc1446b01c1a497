use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub project_url: Option<String>,
    /// Mirrors the first ordered attachment at creation time.
    pub image_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::project_image::Entity")]
    ProjectImage,
}

impl Related<super::project_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectImage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
