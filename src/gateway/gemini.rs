use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Content, GatewayError, GenerationProvider, Part};
use crate::config::Config;

/// Gemini `generateContent` for text and Imagen `predict` for images.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    text_model: String,
    image_model: String,
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextRequest<'a> {
    contents: &'a [Content],
    system_instruction: SystemInstruction,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct TextResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl GeminiProvider {
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.upstream_timeout())
            .build()
            .map_err(|e| GatewayError::Upstream(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            api_key: config.gemini_api_key.clone(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            temperature: config.generation_temperature,
        })
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| GatewayError::Upstream("Generation API key is not configured".into()))
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key()?)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|env| env.error.message)
            .unwrap_or_else(|_| format!("Upstream provider returned {}", status));
        tracing::warn!("Upstream call to {} failed with {}: {}", url, status, message);
        Err(GatewayError::Upstream(message))
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    async fn generate_text(
        &self,
        contents: &[Content],
        system_instruction: &str,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.text_model);
        let body = TextRequest {
            contents,
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system_instruction.to_string(),
                }],
            },
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let response: TextResponse = self
            .post(&url, &body)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("Malformed provider response: {}", e)))?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| GatewayError::Upstream("Provider returned no candidates".into()))
    }

    async fn generate_image(&self, prompt: &str) -> Result<String, GatewayError> {
        let url = format!("{}/models/{}:predict", self.base_url, self.image_model);
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1, "aspectRatio": "1:1" },
        });

        let response: ImageResponse = self
            .post(&url, &body)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("Malformed provider response: {}", e)))?;

        response
            .predictions
            .into_iter()
            .find_map(|p| p.bytes_base64_encoded)
            .filter(|b64| !b64.is_empty())
            .ok_or_else(|| GatewayError::Upstream("No image data returned".into()))
    }
}
