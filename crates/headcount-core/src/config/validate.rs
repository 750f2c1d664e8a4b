//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::{Config, SinkKind};

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_upload_mb == 0 {
            return Err(ConfigError::ValidationError(
                "server.max_upload_mb must be > 0".into(),
            ));
        }

        let gemini = &self.backends.gemini;
        if gemini.enabled {
            if gemini.timeout_ms == 0 {
                return Err(ConfigError::ValidationError(
                    "backends.gemini.timeout_ms must be > 0".into(),
                ));
            }
            if gemini.endpoint.trim().is_empty() || gemini.model.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "backends.gemini.endpoint and backends.gemini.model must be set".into(),
                ));
            }
            if gemini.prompt.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "backends.gemini.prompt must not be empty".into(),
                ));
            }
        }

        let detection = &self.backends.detection;
        if detection.enabled {
            if detection.timeout_ms == 0 {
                return Err(ConfigError::ValidationError(
                    "backends.detection.timeout_ms must be > 0".into(),
                ));
            }
            if detection.endpoint.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "backends.detection.endpoint must be set".into(),
                ));
            }
            if detection.person_label.is_empty() {
                return Err(ConfigError::ValidationError(
                    "backends.detection.person_label must not be empty".into(),
                ));
            }
        }

        if self.sink.kind == SinkKind::Firestore {
            let firestore = &self.sink.firestore;
            // The project may instead come from the service-account key.
            if firestore.project_id.trim().is_empty() && firestore.credentials.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "sink.firestore.project_id or sink.firestore.credentials must be set \
                     when sink.kind = \"firestore\""
                        .into(),
                ));
            }
            if firestore.collection.trim_matches('/').is_empty() {
                return Err(ConfigError::ValidationError(
                    "sink.firestore.collection must not be empty".into(),
                ));
            }
            if firestore.timeout_ms == 0 {
                return Err(ConfigError::ValidationError(
                    "sink.firestore.timeout_ms must be > 0".into(),
                ));
            }
        }

        Ok(())
    }
}
