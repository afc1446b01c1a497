use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Blogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Blogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Blogs::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Blogs::Content).text())
                    .col(ColumnDef::new(Blogs::Date).timestamp().not_null())
                    .col(ColumnDef::new(Blogs::ImageUrl).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BlogImages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BlogImages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BlogImages::BlogId).integer().not_null())
                    .col(ColumnDef::new(BlogImages::ImageUrl).string().not_null())
                    .col(
                        ColumnDef::new(BlogImages::Position)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_blog_images_blog_id")
                            .from(BlogImages::Table, BlogImages::BlogId)
                            .to(Blogs::Table, Blogs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_blog_images_blog_position")
                    .table(BlogImages::Table)
                    .col(BlogImages::BlogId)
                    .col(BlogImages::Position)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BlogImages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Blogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Blogs {
    Table,
    Id,
    Title,
    Content,
    Date,
    ImageUrl,
}

#[derive(DeriveIden)]
enum BlogImages {
    Table,
    Id,
    BlogId,
    ImageUrl,
    Position,
}
