use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::Config;
use crate::routes::chat::model::ChatMessage;
use crate::routes::user::model::User;

mod memory;
mod postgres;

pub use memory::MemoryDatastore;
pub use postgres::PgDatastore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("datastore unavailable: {0}")]
    Unavailable(String),
    #[error("unique constraint violated")]
    Duplicate,
    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Duplicate,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the username is taken.
    async fn insert_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait ChatLogRepository: Send + Sync {
    async fn load_log(&self, user_id: Uuid) -> Result<Option<Vec<ChatMessage>>, StoreError>;

    /// Replaces the whole log, creating it if missing.
    async fn save_log(&self, user_id: Uuid, messages: &[ChatMessage]) -> Result<(), StoreError>;

    async fn delete_log(&self, user_id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Datastore: UserRepository + ChatLogRepository {
    /// Cheap, local check run before every datastore-backed request.
    fn is_available(&self) -> bool;

    /// Round trip to the backend, used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

pub async fn connect(config: &Config) -> Result<Arc<dyn Datastore>, StoreError> {
    if config.uses_memory_store() {
        tracing::warn!("Using in-memory datastore, nothing will be persisted");
        return Ok(Arc::new(MemoryDatastore::new()));
    }

    let store = PgDatastore::connect(config).await?;
    store.init_schema().await?;
    Ok(Arc::new(store))
}
