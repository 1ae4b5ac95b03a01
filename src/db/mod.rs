mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::events::EventSink;
use crate::payments::PaymentProcessor;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool and injected capabilities.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Payment processor capability. Injected so tests can substitute a
    /// deterministic fake for the live client.
    pub processor: Arc<dyn PaymentProcessor>,
    /// Domain event sink consumed by the notification collaborator.
    pub events: Arc<dyn EventSink>,
    /// Base URL for processor redirects (e.g., https://api.example.com)
    pub base_url: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
