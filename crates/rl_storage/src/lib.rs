use std::sync::Arc;
use async_trait::async_trait;
use rl_core::config::{AppConfig, StorageKind};
use rl_core::{DocumentStore, Result};

pub mod backends;
pub mod repo;

pub use backends::*;
pub use repo::{ArticleQuery, ArticleRepository, JobTracker, ProfileRepository, RecommendationOutcome, RecommendationService, SearchType};

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_error_message() -> &'static str;
    async fn new(config: &AppConfig) -> Result<Self> where Self: Sized;
}

/// Build the document store selected by `config.storage`.
pub async fn create_storage(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.storage {
        StorageKind::Memory => Ok(Arc::new(MemoryStorage::new(config).await?)),
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => match SQLiteStorage::new(config).await {
            Ok(storage) => Ok(Arc::new(storage)),
            Err(e) => {
                tracing::error!("{}: {}", SQLiteStorage::get_error_message(), e);
                Err(e)
            }
        },
        #[cfg(not(feature = "sqlite"))]
        StorageKind::Sqlite => Err(rl_core::Error::Storage(
            "SQLite support is not compiled in, rebuild with the `sqlite` feature".to_string(),
        )),
    }
}

pub mod prelude {
    pub use super::StorageBackend;
    pub use super::backends::*;
    pub use super::repo::*;
}
