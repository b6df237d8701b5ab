use std::sync::Arc;

use crate::database::postgres::{PgComics, PgMessages, PgUsers};
use crate::database::{ComicRepository, DatabaseManager, HealthCheck, MessageRepository, UserRepository};

/// Shared handles every handler receives through axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub comics: Arc<dyn ComicRepository>,
    pub health: Arc<dyn HealthCheck>,
}

impl AppState {
    /// State backed by the PostgreSQL repositories.
    pub fn from_database(db: &DatabaseManager) -> Self {
        let pool = db.pool().clone();
        Self {
            users: Arc::new(PgUsers::new(pool.clone())),
            messages: Arc::new(PgMessages::new(pool.clone())),
            comics: Arc::new(PgComics::new(pool)),
            health: Arc::new(db.clone()),
        }
    }
}
