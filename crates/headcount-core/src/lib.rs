//! Headcount Core - crowd-level estimation from a single photograph.
//!
//! Several independent image-analysis backends are asked how many people an
//! image shows; their answers are combined into one robust count and mapped
//! to a crowd-level tier.
//!
//! # Architecture
//!
//! ```text
//! image ─┬─> Gemini adapter ────┐
//!        └─> detection adapter ─┴─> combine → (count, tier) → update sink
//!           (each with its own credential pool)
//! ```
//!
//! A backend that fails for any reason contributes 0, and zeros are left out
//! of the average, so one broken backend never sinks a request.
//!
//! # Usage
//!
//! ```rust,ignore
//! use headcount_core::{Config, Headcount};
//!
//! #[tokio::main]
//! async fn main() -> headcount_core::Result<()> {
//!     let headcount = Headcount::new(Config::load()?)?;
//!     let image = std::fs::read("bus.jpg")?;
//!     let estimation = headcount.estimate(&image).await;
//!     println!("{} people ({})", estimation.estimate.count, estimation.estimate.level);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod aggregate;
pub mod backend;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod sink;

// Re-exports for convenient access
pub use aggregate::{combine, AggregateEstimate, CrowdLevel};
pub use backend::{BackendAdapter, BackendFactory, BackendOutcome, ImageInput};
pub use config::Config;
pub use credentials::{Credential, CredentialPool};
pub use dispatch::{BackendReport, Dispatcher};
pub use error::{BackendError, ConfigError, HeadcountError, Result, SinkError};
pub use sink::{create_sink, MemorySink, SubjectUpdate, Telemetry, UpdateSink};

use std::sync::Arc;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-backend outcomes of one image together with the combined estimate.
#[derive(Debug, Clone)]
pub struct Estimation {
    pub reports: Vec<BackendReport>,
    pub estimate: AggregateEstimate,
}

/// Headcount estimator - the main entry point.
///
/// Built once at start from an immutable [`Config`]; safe to share across
/// concurrent requests behind an `Arc`.
pub struct Headcount {
    config: Config,
    dispatcher: Dispatcher,
    sink: Option<Arc<dyn UpdateSink>>,
}

impl Headcount {
    /// Create an estimator with the backends and sink named in `config`.
    pub fn new(config: Config) -> Result<Self> {
        tracing::debug!("Initializing Headcount v{}", VERSION);

        let credentials = CredentialPool::from_config(&config.backends);
        let adapters = BackendFactory::create_all(&config.backends);
        for adapter in &adapters {
            let available = credentials.available(adapter.pool());
            if available == 0 {
                tracing::warn!(
                    backend = adapter.name(),
                    "No credentials for {}; it will contribute 0 to every estimate",
                    adapter.name()
                );
            } else {
                tracing::info!(backend = adapter.name(), keys = available, "Backend ready");
            }
        }

        let sink = create_sink(&config.sink)?;
        match &sink {
            Some(sink) => tracing::info!(sink = sink.name(), "Update sink configured"),
            None => tracing::warn!("No update sink configured; estimates will not be persisted"),
        }

        let dispatcher = Dispatcher::new(adapters, Arc::new(credentials));
        Ok(Self::with_parts(config, dispatcher, sink))
    }

    /// Assemble an estimator from pre-built parts.
    pub fn with_parts(
        config: Config,
        dispatcher: Dispatcher,
        sink: Option<Arc<dyn UpdateSink>>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            sink,
        }
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Names of the backends consulted for every image.
    pub fn backends(&self) -> Vec<&str> {
        self.dispatcher.backends()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Estimate the crowd in one image. Never fails: unavailable backends
    /// simply contribute 0.
    pub async fn estimate(&self, image: &[u8]) -> Estimation {
        let input = Arc::new(ImageInput::from_bytes(image));
        let reports = self.dispatcher.run(input).await;
        let estimate = AggregateEstimate::from_reports(&reports);

        let counts: Vec<String> = reports
            .iter()
            .map(|r| format!("{}={}", r.backend, r.outcome.count()))
            .collect();
        tracing::info!(
            backends = %counts.join(", "),
            people_count = estimate.count,
            crowd_level = %estimate.level,
            "Estimate ready"
        );

        Estimation { reports, estimate }
    }

    /// Estimate the crowd in `image` and merge the result into the subject's
    /// record.
    ///
    /// A sink failure is logged and otherwise ignored; the estimate is
    /// returned either way.
    pub async fn submit(&self, telemetry: &Telemetry, image: &[u8]) -> Estimation {
        let estimation = self.estimate(image).await;

        if let Some(sink) = &self.sink {
            let update = SubjectUpdate::new(telemetry, &estimation.estimate);
            match sink.merge_write(&telemetry.subject_id, &update).await {
                Ok(()) => tracing::info!(
                    subject = %telemetry.subject_id,
                    sink = sink.name(),
                    "Record updated"
                ),
                Err(e) => tracing::error!(
                    subject = %telemetry.subject_id,
                    sink = sink.name(),
                    "Record update failed: {e}"
                ),
            }
        }

        estimation
    }
}
