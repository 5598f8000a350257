//! Account store implementations
//!
//! This module provides concrete implementations of the AccountStore trait.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryAccountStore;
pub use sqlite::SqliteAccountStore;

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::traits::AccountStore;

/// Open the store described by the configuration
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn AccountStore>, crate::Error> {
    Ok(match config {
        StoreConfig::Sqlite { path } => Arc::new(SqliteAccountStore::open(path).await?),
        StoreConfig::Memory => Arc::new(MemoryAccountStore::new()),
    })
}
