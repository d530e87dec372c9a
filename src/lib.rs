pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod models;
pub mod registry;

pub use error::{RegistryError, Result};
pub use models::Poll;
pub use registry::Registry;

use config::{Config, StoreKind};
use db::Database;
use registry::{MemoryStore, SqliteStore};

/// Builds the registry over whichever store `config` selects.
pub async fn registry_from_config(config: &Config) -> Result<Registry> {
    let registry = match config.store {
        StoreKind::Memory => Registry::new(MemoryStore::new()),
        StoreKind::Sqlite => {
            let db = Database::connect(&config.database_url, config.database_max_connections).await?;
            Registry::new(SqliteStore::with_vote_attempts(db, config.vote_retry_limit))
        }
    };
    Ok(registry)
}
