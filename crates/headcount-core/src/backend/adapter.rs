//! Backend adapter trait, image payload and outcome types.
//!
//! Adapters report failures as `Err(BackendError)`; [`analyze`] is the single
//! boundary that turns every failure (missing credential, timeout, transport,
//! malformed payload) into [`BackendOutcome::Unavailable`]. Nothing past that
//! point ever sees an error.

use crate::credentials::Credential;
use crate::error::BackendError;
use async_trait::async_trait;
use base64::Engine;
use std::time::{Duration, Instant};

/// Base64-encoded image ready to send to a backend API.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
    /// Size of the raw image in bytes
    pub byte_len: usize,
}

impl ImageInput {
    /// Encode raw image bytes, sniffing the MIME type from magic bytes.
    ///
    /// The image is never decoded; unknown signatures are sent as JPEG.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let media_type = sniff_media_type(bytes).unwrap_or_else(|| {
            tracing::debug!("Unrecognized image signature, defaulting to image/jpeg");
            "image/jpeg"
        });

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
            byte_len: bytes.len(),
        }
    }
}

fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'B', b'M', ..] => Some("image/bmp"),
        _ => None,
    }
}

/// What one backend contributed to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutcome {
    /// The backend answered with a people count
    Counted(u32),
    /// The backend could not answer; the reason is kept for logging only
    Unavailable(BackendError),
}

impl BackendOutcome {
    /// Collapse to the sentinel-tolerant count: unavailable backends count 0.
    pub fn count(&self) -> u32 {
        match self {
            BackendOutcome::Counted(n) => *n,
            BackendOutcome::Unavailable(_) => 0,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, BackendOutcome::Counted(_))
    }
}

/// Trait that all image-analysis backends implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the dispatcher holds `Arc<dyn BackendAdapter>`).
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Backend name for logging and result correlation (e.g., "gemini").
    fn name(&self) -> &str;

    /// Credential pool this backend draws from.
    fn pool(&self) -> &str;

    /// Upper bound on one call, enforced by [`analyze`].
    fn timeout(&self) -> Duration;

    /// Count the people visible in `image`.
    async fn count_people(
        &self,
        image: &ImageInput,
        credential: &Credential,
    ) -> Result<u32, BackendError>;
}

/// Run one adapter against an image without ever failing.
///
/// A missing credential, an error from the adapter, or a call exceeding the
/// adapter's timeout all yield [`BackendOutcome::Unavailable`].
pub async fn analyze(
    adapter: &dyn BackendAdapter,
    image: &ImageInput,
    credential: Option<&Credential>,
) -> BackendOutcome {
    let name = adapter.name();
    let Some(credential) = credential else {
        tracing::warn!(backend = name, "No {name} credentials configured");
        return BackendOutcome::Unavailable(BackendError::MissingCredential {
            backend: name.to_string(),
        });
    };

    let start = Instant::now();
    let timeout = adapter.timeout();
    let result = match tokio::time::timeout(timeout, adapter.count_people(image, credential)).await
    {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout {
            backend: name.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    };

    match result {
        Ok(count) => {
            tracing::debug!(
                backend = name,
                count,
                latency_ms = start.elapsed().as_millis() as u64,
                "Backend answered"
            );
            BackendOutcome::Counted(count)
        }
        Err(e) => {
            tracing::warn!(backend = name, "Backend unavailable: {e}");
            BackendOutcome::Unavailable(e)
        }
    }
}
