use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use mc_core::{ArticleStore, Error, Result};

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_error_message() -> &'static str;
    async fn new() -> Result<Self> where Self: Sized;
}

/// Build the store named on the command line.
pub async fn create_storage(kind: &str, db_path: Option<&Path>) -> Result<Arc<dyn ArticleStore>> {
    match kind {
        "memory" => Ok(Arc::new(MemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let storage = match db_path {
                Some(path) => SQLiteStorage::new_with_path(path).await,
                None => <SQLiteStorage as StorageBackend>::new().await,
            }
            .map_err(|e| {
                tracing::error!("{}", SQLiteStorage::get_error_message());
                e
            })?;
            tracing::info!(path = %storage.get_db_path().display(), "Opened SQLite article store");
            Ok(Arc::new(storage))
        }
        other => {
            let _ = db_path;
            Err(Error::Configuration(format!("Unsupported storage backend: {}", other)))
        }
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageBackend};
}
