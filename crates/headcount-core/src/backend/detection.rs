//! Object-detection backend using the Hugging Face inference API.
//!
//! Posts the image as base64 JSON to a hosted detection model (DETR by
//! default) and counts the detections labelled as a person.

use super::adapter::{BackendAdapter, ImageInput};
use crate::config::DetectionConfig;
use crate::credentials::{Credential, DETECTION_POOL};
use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Detection-model adapter.
pub struct DetectionAdapter {
    endpoint: String,
    person_label: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl DetectionAdapter {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            person_label: config.person_label.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

/// One labelled detection. Only `label` matters for counting; the rest is
/// tolerated when missing.
#[derive(Debug, Clone, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default, rename = "box")]
    pub bbox: Option<BoundingBox>,
}

/// Detection box in image pixel coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

/// The inference API answers with either a detection list or an error object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum InferenceResponse {
    Detections(Vec<Detection>),
    Error { error: serde_json::Value },
}

impl InferenceResponse {
    fn error_message(error: &serde_json::Value) -> String {
        match error {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Count detections whose label matches `person_label` exactly.
pub(crate) fn count_label(detections: &[Detection], person_label: &str) -> u32 {
    detections
        .iter()
        .filter(|d| d.label.as_deref() == Some(person_label))
        .count() as u32
}

#[async_trait]
impl BackendAdapter for DetectionAdapter {
    fn name(&self) -> &str {
        "detection"
    }

    fn pool(&self) -> &str {
        DETECTION_POOL
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn count_people(
        &self,
        image: &ImageInput,
        credential: &Credential,
    ) -> Result<u32, BackendError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(&InferenceRequest {
                inputs: &image.data,
            })
            .send()
            .await
            .map_err(|e| BackendError::Http {
                backend: self.name().to_string(),
                message: format!("Detection request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| BackendError::Http {
            backend: self.name().to_string(),
            message: format!("Failed to read detection response: {e}"),
            status_code: Some(status.as_u16()),
        })?;

        let http_failure = || BackendError::Http {
            backend: self.name().to_string(),
            message: format!("Detection HTTP {status}: {body}"),
            status_code: Some(status.as_u16()),
        };

        // Error payloads arrive with both success and failure statuses
        // (e.g. 503 while the model loads), so inspect the body first.
        match serde_json::from_str::<InferenceResponse>(&body) {
            Ok(InferenceResponse::Error { error }) => Err(BackendError::Api {
                backend: self.name().to_string(),
                message: InferenceResponse::error_message(&error),
            }),
            Ok(InferenceResponse::Detections(detections)) if status.is_success() => {
                let people = count_label(&detections, &self.person_label);
                tracing::trace!(
                    detections = detections.len(),
                    people,
                    "Detection response parsed"
                );
                Ok(people)
            }
            Ok(InferenceResponse::Detections(_)) => Err(http_failure()),
            Err(_) if !status.is_success() => Err(http_failure()),
            Err(e) => Err(BackendError::Parse {
                backend: self.name().to_string(),
                message: format!("Failed to parse detection response: {e}"),
            }),
        }
    }
}
