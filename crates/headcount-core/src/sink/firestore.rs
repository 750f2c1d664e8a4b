//! Firestore update sink over the REST `documents:commit` API.
//!
//! Each write is a single `update` with an `updateMask` naming exactly the
//! written fields, which gives merge semantics, and a `REQUEST_TIME`
//! transform so `lastUpdated` is assigned by the server.

use super::auth::{ServiceAccountKey, ServiceAccountTokens};
use super::{validate_subject_id, FieldValue, SubjectUpdate, UpdateSink, UPDATED_AT_FIELD};
use crate::config::{resolve_env_var, FirestoreConfig};
use crate::error::SinkError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Where the bearer token for each commit comes from.
enum Auth {
    /// Minted from a service-account key and refreshed before expiry
    ServiceAccount(ServiceAccountTokens),
    /// A fixed token from config
    Static(String),
    /// No token at all (emulator)
    Anonymous,
}

/// Firestore REST sink.
pub struct FirestoreSink {
    commit_url: String,
    documents_root: String,
    collection: String,
    auth: Auth,
    timeout: Duration,
    client: reqwest::Client,
}

impl FirestoreSink {
    pub fn new(config: &FirestoreConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::new();
        let timeout = Duration::from_millis(config.timeout_ms);

        let service_account = resolve_env_var(&config.credentials)
            .map(|raw| ServiceAccountKey::load(&raw))
            .transpose()?;

        let project = match config.project_id.trim() {
            "" => service_account
                .as_ref()
                .and_then(|key| key.project_id.clone())
                .unwrap_or_default(),
            project => project.to_string(),
        };
        if project.is_empty() {
            return Err(SinkError::NotConfigured(
                "sink.firestore.project_id is empty and no service account names a project"
                    .to_string(),
            ));
        }

        let auth = match service_account {
            Some(key) => {
                tracing::info!(
                    account = %key.client_email,
                    "Firestore writes use service-account tokens"
                );
                Auth::ServiceAccount(ServiceAccountTokens::new(&key, client.clone(), timeout)?)
            }
            None => match resolve_env_var(&config.access_token) {
                Some(token) => {
                    tracing::warn!("Firestore uses a fixed access token; writes fail once it expires");
                    Auth::Static(token)
                }
                None => {
                    tracing::warn!(
                        "No Firestore credentials resolved; writes are sent unauthenticated (emulator only)"
                    );
                    Auth::Anonymous
                }
            },
        };

        let documents_root = format!("projects/{project}/databases/(default)/documents");
        Ok(Self {
            commit_url: format!(
                "{}/{documents_root}:commit",
                config.endpoint.trim_end_matches('/')
            ),
            documents_root,
            collection: config.collection.trim_matches('/').to_string(),
            auth,
            timeout,
            client,
        })
    }

    async fn bearer_token(&self) -> Result<Option<String>, SinkError> {
        match &self.auth {
            Auth::ServiceAccount(tokens) => tokens.token().await.map(Some),
            Auth::Static(token) => Ok(Some(token.clone())),
            Auth::Anonymous => Ok(None),
        }
    }

    fn document_name(&self, id: &str) -> String {
        format!("{}/{}/{id}", self.documents_root, self.collection)
    }

    fn commit_body(&self, id: &str, update: &SubjectUpdate) -> CommitRequest {
        let fields = update.fields();
        let field_paths = fields.iter().map(|(name, _)| name.to_string()).collect();
        let values: Map<String, Value> = fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), to_firestore_value(value)))
            .collect();

        CommitRequest {
            writes: vec![Write {
                update: Document {
                    name: self.document_name(id),
                    fields: values,
                },
                update_mask: DocumentMask { field_paths },
                update_transforms: vec![FieldTransform {
                    field_path: UPDATED_AT_FIELD.to_string(),
                    set_to_server_value: "REQUEST_TIME".to_string(),
                }],
            }],
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct CommitRequest {
    writes: Vec<Write>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Write {
    update: Document,
    update_mask: DocumentMask,
    update_transforms: Vec<FieldTransform>,
}

#[derive(Serialize)]
struct Document {
    name: String,
    fields: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentMask {
    field_paths: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldTransform {
    field_path: String,
    set_to_server_value: String,
}

fn to_firestore_value(value: FieldValue) -> Value {
    match value {
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        // int64 travels as a decimal string in the REST encoding
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
    }
}

#[async_trait]
impl UpdateSink for FirestoreSink {
    fn name(&self) -> &str {
        "firestore"
    }

    async fn merge_write(&self, id: &str, update: &SubjectUpdate) -> Result<(), SinkError> {
        validate_subject_id(id)?;

        let mut request = self
            .client
            .post(&self.commit_url)
            .json(&self.commit_body(id, update))
            .timeout(self.timeout);
        if let Some(token) = self.bearer_token().await? {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| SinkError::Http {
            message: format!("Firestore commit failed: {e}"),
            status_code: None,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SinkError::Http {
                message: format!("Firestore HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| SinkError::Rejected(format!("unreadable commit response: {e}")))?;
        if body.get("writeResults").and_then(Value::as_array).is_none() {
            return Err(SinkError::Rejected(format!(
                "commit response without writeResults: {body}"
            )));
        }

        tracing::debug!(subject = id, "Firestore record merged");
        Ok(())
    }
}
