//! In-process update sink.
//!
//! Keeps one JSON object per subject. Useful for local runs without a
//! database and as the reference for merge semantics in tests.

use super::{validate_subject_id, FieldValue, SubjectUpdate, UpdateSink, UPDATED_AT_FIELD};
use crate::error::SinkError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Merge-writing map of subject records.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: RwLock<HashMap<String, Map<String, Value>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record, e.g. with route metadata written by another system.
    #[cfg(test)]
    pub(crate) async fn insert_record(&self, id: &str, record: Map<String, Value>) {
        self.records.write().await.insert(id.to_string(), record);
    }

    /// Snapshot of one subject's record.
    pub async fn record(&self, id: &str) -> Option<Map<String, Value>> {
        self.records.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::String(s) => Value::String(s),
        FieldValue::Double(d) => serde_json::Number::from_f64(d).map_or(Value::Null, Value::Number),
        FieldValue::Integer(i) => Value::from(i),
    }
}

#[async_trait]
impl UpdateSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn merge_write(&self, id: &str, update: &SubjectUpdate) -> Result<(), SinkError> {
        validate_subject_id(id)?;

        let mut records = self.records.write().await;
        let record = records.entry(id.to_string()).or_default();
        for (field, value) in update.fields() {
            record.insert(field.to_string(), to_json(value));
        }
        record.insert(
            UPDATED_AT_FIELD.to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        Ok(())
    }
}
