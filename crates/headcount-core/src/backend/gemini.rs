//! Generative multimodal backend using the Gemini `generateContent` API.
//!
//! Sends the image inline with a fixed counting instruction and expects the
//! model to reply with a bare integer.

use super::adapter::{BackendAdapter, ImageInput};
use crate::config::GeminiConfig;
use crate::credentials::{Credential, GEMINI_POOL};
use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gemini adapter.
pub struct GeminiAdapter {
    url: String,
    prompt: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiAdapter {
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            url: format!(
                "{}/models/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
            prompt: config.prompt.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            client: reqwest::Client::new(),
        }
    }

    fn http_error(&self, message: String, status_code: Option<u16>) -> BackendError {
        BackendError::Http {
            backend: self.name().to_string(),
            message,
            status_code,
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Interpret the model's reply as a non-negative integer.
///
/// Only a bare integer (surrounding whitespace allowed) is accepted; prose
/// such as "There are 5 people" is rejected.
pub(crate) fn parse_count(reply: &str) -> Result<u32, String> {
    reply
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("expected a bare integer, got {reply:?} ({e})"))
}

#[async_trait]
impl BackendAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn pool(&self) -> &str {
        GEMINI_POOL
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn count_people(
        &self,
        image: &ImageInput,
        credential: &Credential,
    ) -> Result<u32, BackendError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: self.prompt.clone(),
                    },
                    Part::InlineData {
                        inline_data: Blob {
                            mime_type: image.media_type.clone(),
                            data: image.data.clone(),
                        },
                    },
                ],
            }],
        };

        let resp = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.http_error(format!("Gemini request failed: {e}"), None))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(self.http_error(
                format!("Gemini HTTP {status}: {text}"),
                Some(status.as_u16()),
            ));
        }

        let generated: GenerateResponse = resp.json().await.map_err(|e| BackendError::Parse {
            backend: self.name().to_string(),
            message: format!("Failed to parse Gemini response: {e}"),
        })?;

        let reply = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
            .ok_or_else(|| BackendError::Parse {
                backend: self.name().to_string(),
                message: "Gemini returned no candidates".to_string(),
            })?;

        parse_count(&reply).map_err(|message| BackendError::Parse {
            backend: self.name().to_string(),
            message,
        })
    }
}
