use serde::{Deserialize, Serialize};

use crate::gateway::Content;

/// `systemInstruction` may be sent as a bare string or in the provider's content shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SystemInstruction {
    Text(String),
    Content(Content),
}

impl SystemInstruction {
    pub fn text(&self) -> String {
        match self {
            SystemInstruction::Text(text) => text.clone(),
            SystemInstruction::Content(content) => content
                .parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTextRequest {
    #[serde(default)]
    pub contents: Vec<Content>,
    #[serde(default)]
    pub system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateTextResponse {
    pub candidates: Vec<CandidateBody>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CandidateBody {
    pub content: Content,
}

impl GenerateTextResponse {
    pub fn from_text(text: String) -> Self {
        Self {
            candidates: vec![CandidateBody {
                content: Content::text("model", text),
            }],
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ImageInstance {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerateImageRequest {
    #[serde(default)]
    pub instances: Vec<ImageInstance>,
}

impl GenerateImageRequest {
    pub fn prompt(&self) -> &str {
        self.instances
            .first()
            .map(|i| i.prompt.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub image_base64: String,
}
