//! Update sinks: where estimates are persisted per subject.
//!
//! A sink performs merge writes. Only the fields of a [`SubjectUpdate`] (plus
//! the store-assigned `lastUpdated`) are touched; anything else already on the
//! subject's record, such as route or destination, survives.

pub(crate) mod auth;
pub(crate) mod firestore;
pub(crate) mod memory;

pub use firestore::FirestoreSink;
pub use memory::MemorySink;

use crate::aggregate::{AggregateEstimate, CrowdLevel};
use crate::config::{SinkConfig, SinkKind};
use crate::error::SinkError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Record field holding the store-assigned update time.
pub const UPDATED_AT_FIELD: &str = "lastUpdated";

/// Telemetry that accompanies an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Subject (vehicle or area) identifier
    pub subject_id: String,
    pub lat: f64,
    pub lng: f64,
    pub speed: f64,
}

/// The fields merged into a subject's record after an estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectUpdate {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub speed: f64,
    pub people_count: u32,
    pub crowd_level: CrowdLevel,
}

/// A typed field value, mapped by each sink to its storage representation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Double(f64),
    Integer(i64),
}

impl SubjectUpdate {
    pub fn new(telemetry: &Telemetry, estimate: &AggregateEstimate) -> Self {
        Self {
            id: telemetry.subject_id.clone(),
            lat: telemetry.lat,
            lng: telemetry.lng,
            speed: telemetry.speed,
            people_count: estimate.count,
            crowd_level: estimate.level,
        }
    }

    /// Written fields in record naming, excluding [`UPDATED_AT_FIELD`].
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("id", FieldValue::String(self.id.clone())),
            ("lat", FieldValue::Double(self.lat)),
            ("lng", FieldValue::Double(self.lng)),
            ("speed", FieldValue::Double(self.speed)),
            ("peopleCount", FieldValue::Integer(i64::from(self.people_count))),
            (
                "crowdLevel",
                FieldValue::String(self.crowd_level.as_str().to_string()),
            ),
        ]
    }
}

/// Capability to persist estimates with merge semantics.
///
/// Implementations must tolerate concurrent writes for different subjects;
/// for the same subject the last write wins field by field.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    /// Sink name for logging (e.g., "firestore").
    fn name(&self) -> &str;

    /// Merge `update` into the record keyed by `id`, creating it if needed.
    async fn merge_write(&self, id: &str, update: &SubjectUpdate) -> Result<(), SinkError>;
}

/// Reject ids that cannot name a single record.
pub(crate) fn validate_subject_id(id: &str) -> Result<(), SinkError> {
    if id.trim().is_empty() || id.contains('/') {
        return Err(SinkError::InvalidSubject(id.to_string()));
    }
    Ok(())
}

/// Build the sink selected in config; `None` when persistence is disabled.
pub fn create_sink(config: &SinkConfig) -> Result<Option<Arc<dyn UpdateSink>>, SinkError> {
    match config.kind {
        SinkKind::None => Ok(None),
        SinkKind::Memory => Ok(Some(Arc::new(MemorySink::new()))),
        SinkKind::Firestore => Ok(Some(Arc::new(FirestoreSink::new(&config.firestore)?))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry() -> Telemetry {
        Telemetry {
            subject_id: "bus-42".into(),
            lat: 6.9271,
            lng: 79.8612,
            speed: 32.5,
        }
    }

    #[test]
    fn test_update_fields_use_record_names() {
        let estimate = crate::aggregate::combine(&[30, 0]);
        let update = SubjectUpdate::new(&telemetry(), &estimate);
        let names: Vec<&str> = update.fields().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["id", "lat", "lng", "speed", "peopleCount", "crowdLevel"]
        );
        assert!(update
            .fields()
            .contains(&("crowdLevel", FieldValue::String("High".into()))));
        assert!(update
            .fields()
            .contains(&("peopleCount", FieldValue::Integer(30))));
    }

    #[test]
    fn test_validate_subject_id() {
        assert!(validate_subject_id("bus-42").is_ok());
        assert!(validate_subject_id("").is_err());
        assert!(validate_subject_id("  ").is_err());
        assert!(validate_subject_id("a/b").is_err());
    }

    #[test]
    fn test_create_sink_by_kind() {
        let mut config = SinkConfig::default();
        assert!(create_sink(&config).unwrap().is_none());

        config.kind = SinkKind::Memory;
        assert_eq!(create_sink(&config).unwrap().unwrap().name(), "memory");
    }
}
