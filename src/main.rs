use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use portfolio_server::config::Config;
use portfolio_server::services::media_store::MediaStore;
use portfolio_server::services::seed::seed_projects;
use portfolio_server::{create_routes, AppState};

#[derive(Parser)]
#[command(name = "portfolio-server", version, about = "Portfolio REST API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run pending migrations and serve the API (default)
    Serve,
    /// Run pending migrations and exit
    Migrate,
    /// Insert the demo projects if none exist
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,portfolio_server=debug,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            info!("Migrations applied");
        }
        Command::Seed => {
            let inserted = seed_projects(&db).await?;
            info!(inserted, "Seeding finished");
        }
        Command::Serve => {
            let media = MediaStore::new(config.upload_dir.clone()).await?;
            let port = config.port;
            let app = create_routes(AppState::new(db, config, media));

            let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
            info!(addr = %listener.local_addr()?, "Server is running");
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
