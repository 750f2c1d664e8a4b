//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};

/// Instruction sent with every image to the generative backend.
pub const DEFAULT_COUNT_PROMPT: &str = "Count the exact number of people visible inside this bus or crowd. \
     Respond with ONLY the integer number (e.g. 5).";

/// HTTP ingest server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to bind (the `PORT` env var takes precedence)
    pub port: u16,

    /// Directory holding the frontend build served at `/`
    pub static_dir: String,

    /// Maximum accepted request body in megabytes
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7860,
            static_dir: "build".to_string(),
            max_upload_mb: 20,
        }
    }
}

/// Backend adapter settings, one table per integrated backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// Generative multimodal model (Gemini)
    pub gemini: GeminiConfig,

    /// Hosted object-detection model (Hugging Face inference)
    pub detection: DetectionConfig,
}

/// Gemini configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// Include this backend in every dispatch
    pub enabled: bool,

    /// API base URL (the model path is appended)
    pub endpoint: String,

    /// Model name
    pub model: String,

    /// Credential slots (support ${ENV_VAR} syntax; empty slots are skipped)
    pub api_keys: Vec<String>,

    /// Upper bound on one call in milliseconds
    pub timeout_ms: u64,

    /// Counting instruction sent alongside the image
    pub prompt: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_keys: env_slots("GEMINI_KEY"),
            timeout_ms: 30_000,
            prompt: DEFAULT_COUNT_PROMPT.to_string(),
        }
    }
}

/// Object-detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Include this backend in every dispatch
    pub enabled: bool,

    /// Full inference URL of the detection model
    pub endpoint: String,

    /// Credential slots (support ${ENV_VAR} syntax; empty slots are skipped)
    pub api_keys: Vec<String>,

    /// Upper bound on one call in milliseconds
    pub timeout_ms: u64,

    /// Detection label counted as a person
    pub person_label: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://router.huggingface.co/hf-inference/models/facebook/detr-resnet-50"
                .to_string(),
            api_keys: env_slots("HF_KEY"),
            timeout_ms: 30_000,
            person_label: "person".to_string(),
        }
    }
}

/// `${PREFIX_1}` .. `${PREFIX_5}`.
fn env_slots(prefix: &str) -> Vec<String> {
    (1..=5).map(|i| format!("${{{prefix}_{i}}}")).collect()
}

/// Which store receives estimate updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Estimates are returned but not persisted
    #[default]
    None,
    /// In-process map, lost on restart
    Memory,
    /// Firestore over its REST API
    Firestore,
}

/// Update sink settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Selected sink
    pub kind: SinkKind,

    /// Firestore settings, used when `kind = "firestore"`
    pub firestore: FirestoreConfig,
}

/// Firestore configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirestoreConfig {
    /// REST API base URL
    pub endpoint: String,

    /// Google Cloud project id (defaults to the service account's project)
    pub project_id: String,

    /// Service-account key, inline JSON or a file path (supports ${ENV_VAR}
    /// syntax). Tokens are minted and refreshed from it.
    pub credentials: String,

    /// Fixed OAuth access token, used only without `credentials`, e.g.
    /// against the emulator (supports ${ENV_VAR} syntax)
    pub access_token: String,

    /// Collection path holding one document per subject
    pub collection: String,

    /// Upper bound on one write in milliseconds
    pub timeout_ms: u64,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://firestore.googleapis.com/v1".to_string(),
            project_id: String::new(),
            credentials: "${FIREBASE_CREDENTIALS}".to_string(),
            access_token: "${FIRESTORE_ACCESS_TOKEN}".to_string(),
            collection: "public/data/buses".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
