use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "blogs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,
    /// Stamped on creation and on every update.
    pub date: DateTime,
    pub image_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::blog_image::Entity")]
    BlogImage,
}

impl Related<super::blog_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BlogImage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
