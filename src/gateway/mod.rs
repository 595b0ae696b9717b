//! Proxy to the upstream text and image generation provider.
//!
//! Requests are validated here before anything leaves the process; every call
//! is single-shot and failures are surfaced to the caller without retrying.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod gemini;

pub use gemini::GeminiProvider;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Upstream(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

/// One turn of a conversation in the provider's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate_text(
        &self,
        contents: &[Content],
        system_instruction: &str,
    ) -> Result<String, GatewayError>;

    /// Returns a single square image, base64 encoded.
    async fn generate_image(&self, prompt: &str) -> Result<String, GatewayError>;
}

#[derive(Clone)]
pub struct Gateway {
    provider: Arc<dyn GenerationProvider>,
    persona: String,
}

impl Gateway {
    pub fn new(provider: Arc<dyn GenerationProvider>, persona: impl Into<String>) -> Self {
        Self {
            provider,
            persona: persona.into(),
        }
    }

    pub async fn generate_text(
        &self,
        contents: &[Content],
        system_instruction: Option<&str>,
    ) -> Result<String, GatewayError> {
        if contents.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "Request must include non-empty contents".into(),
            ));
        }

        let instruction = system_instruction
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(self.persona.as_str());
        self.provider.generate_text(contents, instruction).await
    }

    pub async fn generate_image(&self, prompt: &str) -> Result<String, GatewayError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GatewayError::InvalidRequest("Prompt is required".into()));
        }

        self.provider.generate_image(prompt).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned provider that records what reached it.
    #[derive(Default)]
    pub struct StubProvider {
        pub calls: AtomicUsize,
        pub last_instruction: Mutex<Option<String>>,
        pub image: Option<String>,
        pub fail_with: Option<String>,
    }

    #[async_trait]
    impl GenerationProvider for StubProvider {
        async fn generate_text(
            &self,
            contents: &[Content],
            system_instruction: &str,
        ) -> Result<String, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_instruction.lock().unwrap() = Some(system_instruction.to_string());
            if let Some(msg) = &self.fail_with {
                return Err(GatewayError::Upstream(msg.clone()));
            }
            let last = contents
                .last()
                .and_then(|c| c.parts.first())
                .map(|p| p.text.clone())
                .unwrap_or_default();
            Ok(format!("echo: {}", last))
        }

        async fn generate_image(&self, _prompt: &str) -> Result<String, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.image
                .clone()
                .ok_or_else(|| GatewayError::Upstream("No image data returned".into()))
        }
    }

    #[tokio::test]
    async fn empty_contents_never_reach_the_provider() {
        let provider = Arc::new(StubProvider::default());
        let gateway = Gateway::new(provider.clone(), "persona");

        let err = gateway.generate_text(&[], None).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn persona_is_used_unless_overridden() {
        let provider = Arc::new(StubProvider::default());
        let gateway = Gateway::new(provider.clone(), "persona");
        let contents = [Content::text("user", "hi")];

        gateway.generate_text(&contents, None).await.unwrap();
        assert_eq!(provider.last_instruction.lock().unwrap().as_deref(), Some("persona"));

        gateway.generate_text(&contents, Some("be brief")).await.unwrap();
        assert_eq!(provider.last_instruction.lock().unwrap().as_deref(), Some("be brief"));
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let provider = Arc::new(StubProvider::default());
        let gateway = Gateway::new(provider.clone(), "persona");

        let err = gateway.generate_image("   ").await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
