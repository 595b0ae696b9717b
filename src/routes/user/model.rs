use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::{StoreError, UserRepository};
use crate::error::AppError;
use crate::utils::{hash_password, verify_password};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
}

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
// bcrypt ignores everything past 72 bytes
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 6..=72;

impl CredentialsRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(AppError::InvalidInput(
                "Username and password are required".into(),
            ));
        }
        if !USERNAME_LEN.contains(&self.username.len())
            || !self
                .username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::InvalidInput(
                "Username must be 3-32 letters, digits or underscores".into(),
            ));
        }
        if !PASSWORD_LEN.contains(&self.password.len()) {
            return Err(AppError::InvalidInput(
                "Password must be between 6 and 72 bytes".into(),
            ));
        }
        Ok(())
    }
}

impl User {
    pub async fn register<R: UserRepository + ?Sized>(
        repo: &R,
        req: &CredentialsRequest,
        cost: u32,
    ) -> Result<Self, AppError> {
        req.validate()?;

        let password = req.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

        match repo.insert_user(&req.username, &password_hash).await {
            Ok(user) => {
                tracing::info!("Registered user {}", user.username);
                Ok(user)
            }
            Err(StoreError::Duplicate) => Err(AppError::DuplicateUser),
            Err(e) => Err(e.into()),
        }
    }

    /// Unknown users and wrong passwords fail the same way.
    pub async fn verify<R: UserRepository + ?Sized>(
        repo: &R,
        username: &str,
        password: &str,
    ) -> Result<Self, AppError> {
        let Some(user) = repo.find_user(username).await? else {
            tracing::debug!("Login attempt for unknown user");
            return Err(AppError::InvalidCredentials);
        };

        let (password, hash) = (password.to_string(), user.password_hash.clone());
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password check task failed: {}", e)))?;

        match verified {
            Ok(true) => Ok(user),
            Ok(false) => Err(AppError::InvalidCredentials),
            Err(e) => {
                tracing::error!("Stored hash for {} is unreadable: {}", user.username, e);
                Err(AppError::InvalidCredentials)
            }
        }
    }
}
