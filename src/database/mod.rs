pub mod manager;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod schema;

pub use manager::{DatabaseError, DatabaseManager};
pub use repository::{ComicLock, ComicRepository, HealthCheck, MessageRepository, UserRepository};
