pub mod app;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod storage;
pub mod view_models;

use crate::config::{Config, DatabaseBackend};
use crate::storage::{InMemoryStorage, SqliteStorage, Storage};
use std::sync::Arc;
use tracing::info;

/// Storage selected by `[database]`
pub fn open_storage(config: &Config) -> error::Result<Arc<dyn Storage>> {
    match config.database.backend {
        DatabaseBackend::Memory => {
            info!("Using in-memory catalog storage");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        DatabaseBackend::Sqlite => Ok(Arc::new(SqliteStorage::open(&config.database.path)?)),
    }
}
