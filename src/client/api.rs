use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::ClientError;
use crate::error::DB_UNAVAILABLE;
use crate::gateway::Content;
use crate::routes::chat::model::{ChatMessage, NewMessage};
use crate::routes::generate::model::{GenerateImageResponse, GenerateTextResponse};
use crate::routes::user::model::LoginResponse;

/// The server operations the chat client depends on.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn register(&self, username: &str, password: &str) -> Result<(), ClientError>;

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError>;

    async fn history(&self, token: &str) -> Result<Vec<ChatMessage>, ClientError>;

    async fn save(&self, token: &str, message: &NewMessage) -> Result<(), ClientError>;

    async fn clear(&self, token: &str) -> Result<(), ClientError>;

    async fn generate_text(
        &self,
        token: Option<&str>,
        contents: &[Content],
    ) -> Result<String, ClientError>;

    /// Returns the image as base64.
    async fn generate_image(
        &self,
        token: Option<&str>,
        prompt: &str,
    ) -> Result<String, ClientError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// [`Backend`] over the JSON HTTP API.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(90))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ClientError::Transport(format!("Unexpected response: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from(status, &body))
    }
}

fn error_from(status: StatusCode, body: &str) -> ClientError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    if parsed.as_ref().and_then(|b| b.status.as_deref()) == Some(DB_UNAVAILABLE) {
        return ClientError::Unavailable;
    }

    let message = parsed
        .map(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn register(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let req = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({ "username": username, "password": password }));
        let _: serde_json::Value = self.send(req).await?;
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let req = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": password }));
        self.send(req).await
    }

    async fn history(&self, token: &str) -> Result<Vec<ChatMessage>, ClientError> {
        let req = self.client.get(self.url("/chat/history")).bearer_auth(token);
        self.send(req).await
    }

    async fn save(&self, token: &str, message: &NewMessage) -> Result<(), ClientError> {
        let req = self
            .client
            .post(self.url("/chat/save"))
            .bearer_auth(token)
            .json(&json!({ "message": message }));
        let _: serde_json::Value = self.send(req).await?;
        Ok(())
    }

    async fn clear(&self, token: &str) -> Result<(), ClientError> {
        let req = self.client.post(self.url("/chat/clear")).bearer_auth(token);
        let _: serde_json::Value = self.send(req).await?;
        Ok(())
    }

    async fn generate_text(
        &self,
        token: Option<&str>,
        contents: &[Content],
    ) -> Result<String, ClientError> {
        let req = Self::authorized(self.client.post(self.url("/generate-text")), token)
            .json(&json!({ "contents": contents }));
        let response: GenerateTextResponse = self.send(req).await?;
        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| ClientError::Transport("Response held no candidates".into()))
    }

    async fn generate_image(
        &self,
        token: Option<&str>,
        prompt: &str,
    ) -> Result<String, ClientError> {
        let req = Self::authorized(self.client.post(self.url("/generate-image")), token)
            .json(&json!({ "instances": [{ "prompt": prompt }] }));
        let response: GenerateImageResponse = self.send(req).await?;
        Ok(response.image_base64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outage_marker_is_recognised() {
        let err = error_from(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"code":5003,"message":"Database unavailable","status":"db_unavailable"}"#,
        );
        assert!(matches!(err, ClientError::Unavailable));
    }

    #[test]
    fn server_message_is_kept() {
        let err = error_from(
            StatusCode::UNAUTHORIZED,
            r#"{"code":1002,"message":"Invalid credentials"}"#,
        );
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[test]
    fn non_json_errors_fall_back_to_status_text() {
        let err = error_from(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(err.to_string(), "Too Many Requests");
    }
}
