//! Concurrent fan-out of one image to every configured backend.
//!
//! Spawns one tokio task per adapter and waits for all of them; there is no
//! early return on the first answer. Each adapter bounds its own call, so the
//! join cannot hang on an unresponsive backend. Reports come back in adapter
//! order regardless of which backend finished first.

use crate::backend::{analyze, BackendAdapter, BackendOutcome, ImageInput};
use crate::credentials::CredentialPool;
use crate::error::BackendError;
use std::sync::Arc;

/// One backend's contribution, correlated by backend name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReport {
    /// Adapter name (e.g., "gemini")
    pub backend: String,
    /// Count or the reason the backend was unavailable
    pub outcome: BackendOutcome,
}

/// Runs every adapter against the same image.
pub struct Dispatcher {
    adapters: Vec<Arc<dyn BackendAdapter>>,
    credentials: Arc<CredentialPool>,
}

impl Dispatcher {
    pub fn new(adapters: Vec<Arc<dyn BackendAdapter>>, credentials: Arc<CredentialPool>) -> Self {
        Self {
            adapters,
            credentials,
        }
    }

    /// Names of the configured adapters, in report order.
    pub fn backends(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Dispatch `image` to all adapters concurrently and collect every result.
    ///
    /// Each adapter draws its own credential from its own pool. A task that
    /// panics is reported as unavailable like any other backend failure.
    pub async fn run(&self, image: Arc<ImageInput>) -> Vec<BackendReport> {
        let handles: Vec<_> = self
            .adapters
            .iter()
            .map(|adapter| {
                let adapter = adapter.clone();
                let credentials = self.credentials.clone();
                let image = image.clone();
                tokio::spawn(async move {
                    let credential = credentials.select(adapter.pool());
                    analyze(adapter.as_ref(), &image, credential).await
                })
            })
            .collect();

        let outcomes = futures_util::future::join_all(handles).await;

        self.adapters
            .iter()
            .zip(outcomes)
            .map(|(adapter, joined)| {
                let outcome = joined.unwrap_or_else(|e| {
                    tracing::error!(backend = adapter.name(), "Backend task panicked: {e}");
                    BackendOutcome::Unavailable(BackendError::TaskFailed {
                        backend: adapter.name().to_string(),
                        message: e.to_string(),
                    })
                });
                BackendReport {
                    backend: adapter.name().to_string(),
                    outcome,
                }
            })
            .collect()
    }
}
