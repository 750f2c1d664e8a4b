//! Image-analysis backends.
//!
//! Each backend wraps one external service behind [`BackendAdapter`]:
//! image in, people count out. Two are integrated: a generative multimodal
//! model (Gemini) and a hosted object detector (DETR on Hugging Face).

pub(crate) mod adapter;
pub(crate) mod detection;
pub(crate) mod gemini;

pub use adapter::{analyze, BackendAdapter, BackendOutcome, ImageInput};
pub use detection::{BoundingBox, Detection, DetectionAdapter};
pub use gemini::GeminiAdapter;

use crate::config::BackendsConfig;
use std::sync::Arc;

/// Factory that builds the enabled adapters from config.
pub struct BackendFactory;

impl BackendFactory {
    /// Create every enabled adapter, in a stable order (gemini, detection).
    pub fn create_all(config: &BackendsConfig) -> Vec<Arc<dyn BackendAdapter>> {
        let mut adapters: Vec<Arc<dyn BackendAdapter>> = Vec::new();

        if config.gemini.enabled {
            adapters.push(Arc::new(GeminiAdapter::new(&config.gemini)));
        } else {
            tracing::info!("Gemini backend disabled in config");
        }

        if config.detection.enabled {
            adapters.push(Arc::new(DetectionAdapter::new(&config.detection)));
        } else {
            tracing::info!("Detection backend disabled in config");
        }

        adapters
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Test doubles shared by the adapter and dispatcher tests.

    use super::{BackendAdapter, ImageInput};
    use crate::credentials::Credential;
    use crate::error::BackendError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// A configurable mock backend.
    pub struct MockAdapter {
        name: String,
        pool: String,
        result: Result<u32, BackendError>,
        /// Tracks how many times `count_people` was called.
        call_count: Arc<AtomicU32>,
        /// Last credential seen, for pool-routing assertions.
        last_credential: Arc<std::sync::Mutex<Option<String>>>,
        delay: Option<Duration>,
        timeout: Duration,
        panics: bool,
    }

    impl MockAdapter {
        pub fn counting(name: &str, count: u32) -> Self {
            Self {
                name: name.to_string(),
                pool: name.to_string(),
                result: Ok(count),
                call_count: Arc::new(AtomicU32::new(0)),
                last_credential: Arc::new(std::sync::Mutex::new(None)),
                delay: None,
                timeout: Duration::from_secs(5),
                panics: false,
            }
        }

        pub fn failing(name: &str, status_code: Option<u16>, message: &str) -> Self {
            Self {
                result: Err(BackendError::Http {
                    backend: name.to_string(),
                    message: message.to_string(),
                    status_code,
                }),
                ..Self::counting(name, 0)
            }
        }

        pub fn panicking(name: &str) -> Self {
            Self {
                panics: true,
                ..Self::counting(name, 0)
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }

        pub fn call_count_handle(&self) -> Arc<AtomicU32> {
            self.call_count.clone()
        }

        pub fn last_credential_handle(&self) -> Arc<std::sync::Mutex<Option<String>>> {
            self.last_credential.clone()
        }
    }

    #[async_trait]
    impl BackendAdapter for MockAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn pool(&self) -> &str {
            &self.pool
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        async fn count_people(
            &self,
            _image: &ImageInput,
            credential: &Credential,
        ) -> Result<u32, BackendError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            *self.last_credential.lock().unwrap() = Some(credential.expose().to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.panics {
                panic!("mock backend {} exploded", self.name);
            }
            self.result.clone()
        }
    }

    /// Serve `app` on an ephemeral local port; returns its base URL.
    pub async fn spawn_stub(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Accept connections on an ephemeral port and never answer; returns its
    /// base URL.
    pub async fn spawn_black_hole() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}")
    }
}
