use sea_orm::{ConnectionTrait, Database, DbErr, Statement};
use std::env;

const TABLES: &[&str] = &[
    "project_images",
    "projects",
    "blog_images",
    "blogs",
    "photos",
    "seaql_migrations",
];

#[tokio::main]
async fn main() -> Result<(), DbErr> {
    dotenvy::dotenv().ok();
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| DbErr::Custom("DATABASE_URL must be set".to_string()))?;

    let db = Database::connect(database_url).await?;
    let backend = db.get_database_backend();

    for table in TABLES {
        let sql = match backend {
            sea_orm::DbBackend::Postgres => format!("DROP TABLE IF EXISTS \"{}\" CASCADE;", table),
            _ => format!("DROP TABLE IF EXISTS \"{}\";", table),
        };
        db.execute(Statement::from_string(backend, sql)).await?;
    }

    println!("Database reset successfully");
    Ok(())
}
