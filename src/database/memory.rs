use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChatLogRepository, Datastore, StoreError, UserRepository};
use crate::routes::chat::model::ChatMessage;
use crate::routes::user::model::User;

/// Process-local datastore for `memory://` runs and tests.
#[derive(Default)]
pub struct MemoryDatastore {
    users: RwLock<HashMap<String, User>>,
    logs: RwLock<HashMap<Uuid, Vec<ChatMessage>>>,
    offline: AtomicBool,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing the backend; every operation then fails as unavailable.
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryDatastore {
    async fn insert_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        self.check()?;
        let mut users = self.users.write().await;
        if users.contains_key(username) {
            return Err(StoreError::Duplicate);
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        users.insert(username.to_string(), user.clone());
        Ok(user)
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.check()?;
        Ok(self.users.read().await.get(username).cloned())
    }
}

#[async_trait]
impl ChatLogRepository for MemoryDatastore {
    async fn load_log(&self, user_id: Uuid) -> Result<Option<Vec<ChatMessage>>, StoreError> {
        self.check()?;
        Ok(self.logs.read().await.get(&user_id).cloned())
    }

    async fn save_log(&self, user_id: Uuid, messages: &[ChatMessage]) -> Result<(), StoreError> {
        self.check()?;
        self.logs.write().await.insert(user_id, messages.to_vec());
        Ok(())
    }

    async fn delete_log(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.check()?;
        self.logs.write().await.remove(&user_id);
        Ok(())
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    fn is_available(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}
