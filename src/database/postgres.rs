use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use tokio::time::Instant;
use sqlx::types::Json;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

use super::{ChatLogRepository, Datastore, StoreError, UserRepository};
use crate::config::Config;
use crate::routes::chat::model::ChatMessage;
use crate::routes::user::model::User;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS chat_logs (
    user_id UUID PRIMARY KEY REFERENCES users (id),
    messages JSONB NOT NULL DEFAULT '[]'::jsonb,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

/// Remembers a connectivity failure so requests fail fast instead of each
/// waiting out the pool's acquire timeout. After `retry_after` one request
/// is let through again; any successful operation clears the outage.
struct OutageTracker {
    epoch: Instant,
    retry_after: Duration,
    // 0 while healthy, else the epoch offset in ms at which to try again
    retry_at_ms: AtomicU64,
}

impl OutageTracker {
    fn new(retry_after: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            retry_after,
            retry_at_ms: AtomicU64::new(0),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn is_available(&self) -> bool {
        let retry_at = self.retry_at_ms.load(Ordering::Acquire);
        retry_at == 0 || self.now_ms() >= retry_at
    }

    fn record<T>(&self, result: Result<T, sqlx::Error>) -> Result<T, StoreError> {
        match result.map_err(StoreError::from) {
            Ok(value) => {
                if self.retry_at_ms.swap(0, Ordering::AcqRel) != 0 {
                    tracing::info!("Database reachable again");
                }
                Ok(value)
            }
            Err(StoreError::Unavailable(msg)) => {
                let retry_at = (self.now_ms() + self.retry_after.as_millis() as u64).max(1);
                self.retry_at_ms.store(retry_at, Ordering::Release);
                tracing::warn!("Database unavailable: {}", msg);
                Err(StoreError::Unavailable(msg))
            }
            Err(e) => Err(e),
        }
    }
}

pub struct PgDatastore {
    pool: PgPool,
    outage: OutageTracker,
}

impl PgDatastore {
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_connect_timeout())
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET application_name = 'joint_hub';").await?;
                    Ok(())
                })
            })
            .connect(&config.database_url)
            .await?;

        Ok(Self {
            pool,
            outage: OutageTracker::new(config.db_connect_timeout()),
        })
    }

    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Database schema ready");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgDatastore {
    async fn insert_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        self.outage.record(result)
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await;

        self.outage.record(result)
    }
}

#[async_trait]
impl ChatLogRepository for PgDatastore {
    async fn load_log(&self, user_id: Uuid) -> Result<Option<Vec<ChatMessage>>, StoreError> {
        let result = sqlx::query_as::<_, (Json<Vec<ChatMessage>>,)>(
            "SELECT messages FROM chat_logs WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;

        let row = self.outage.record(result)?;
        Ok(row.map(|(Json(messages),)| messages))
    }

    async fn save_log(&self, user_id: Uuid, messages: &[ChatMessage]) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO chat_logs (user_id, messages, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET messages = EXCLUDED.messages, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(Json(messages))
        .execute(&self.pool)
        .await;

        self.outage.record(result).map(|_| ())
    }

    async fn delete_log(&self, user_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM chat_logs WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await;

        self.outage.record(result).map(|_| ())
    }
}

#[async_trait]
impl Datastore for PgDatastore {
    fn is_available(&self) -> bool {
        !self.pool.is_closed() && self.outage.is_available()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let result = sqlx::query("SELECT 1").execute(&self.pool).await;
        self.outage.record(result).map(|_| ())
    }
}
