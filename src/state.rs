use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::services::converter::MediaConverter;
use crate::services::media_store::MediaStore;

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub media: MediaStore,
    pub converter: MediaConverter,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config, media: MediaStore) -> Self {
        let converter = MediaConverter::new(media.clone());
        Self::with_converter(db, config, media, converter)
    }

    pub fn with_converter(
        db: DatabaseConnection,
        config: Config,
        media: MediaStore,
        converter: MediaConverter,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            media,
            converter,
        }
    }
}
