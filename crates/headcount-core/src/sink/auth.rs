//! OAuth access tokens for the Firestore sink.
//!
//! A Google service-account key signs a short-lived RS256 JWT assertion,
//! which the key's `token_uri` exchanges for a bearer token. The token is
//! cached and fetched again shortly before it expires, so a long-running
//! server keeps writing after the first hour.

use crate::error::SinkError;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// OAuth scope covering Firestore reads and writes.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this long before the store would reject them.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a service-account key file that the token flow uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parse a key given either inline as JSON or as a path to a key file.
    pub fn load(raw: &str) -> Result<Self, SinkError> {
        let raw = raw.trim();
        let json = if raw.starts_with('{') {
            raw.to_string()
        } else {
            let path = shellexpand::tilde(raw);
            std::fs::read_to_string(path.as_ref()).map_err(|e| {
                SinkError::NotConfigured(format!("cannot read service account file {raw}: {e}"))
            })?
        };

        serde_json::from_str(&json)
            .map_err(|e| SinkError::NotConfigured(format!("invalid service account key: {e}")))
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Fetches and caches access tokens for one service account.
pub struct ServiceAccountTokens {
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    client: reqwest::Client,
    timeout: Duration,
    cached: RwLock<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(
        key: &ServiceAccountKey,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            SinkError::NotConfigured(format!("invalid service account private key: {e}"))
        })?;

        Ok(Self {
            client_email: key.client_email.clone(),
            token_uri: key.token_uri.clone(),
            signing_key,
            client,
            timeout,
            cached: RwLock::new(None),
        })
    }

    /// A valid access token, from cache when it is not close to expiry.
    pub async fn token(&self) -> Result<String, SinkError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another writer may have refreshed while we waited for the lock.
        if let Some(current) = cached.as_ref() {
            if Instant::now() < current.refresh_at {
                return Ok(current.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    fn assertion(&self) -> Result<String, SinkError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| SinkError::Auth(format!("failed to sign token assertion: {e}")))
    }

    async fn fetch(&self) -> Result<CachedToken, SinkError> {
        let assertion = self.assertion()?;
        let requested_at = Instant::now();

        let resp = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SinkError::Auth(format!("token request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SinkError::Auth(format!("token endpoint HTTP {status}: {text}")));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SinkError::Auth(format!("unreadable token response: {e}")))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(REFRESH_MARGIN);
        tracing::debug!(
            account = %self.client_email,
            expires_in = body.expires_in,
            "Fetched Firestore access token"
        );

        Ok(CachedToken {
            token: body.access_token,
            refresh_at: requested_at + lifetime,
        })
    }
}
