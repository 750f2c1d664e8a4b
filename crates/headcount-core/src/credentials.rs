//! Per-backend credential pools.
//!
//! Each backend type owns a list of credential slots loaded once from
//! configuration. A request draws one valid credential uniformly at random,
//! which spreads load and quota across keys. The pool is immutable after
//! construction, so concurrent requests share it without locking.

use crate::config::{resolve_env_var, BackendsConfig};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::fmt;

/// Pool name used by the generative backend.
pub const GEMINI_POOL: &str = "gemini";

/// Pool name used by the detection backend.
pub const DETECTION_POOL: &str = "detection";

/// An opaque API token scoped to one backend type.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Immutable set of credential slots, keyed by pool name.
#[derive(Debug, Default, Clone)]
pub struct CredentialPool {
    pools: HashMap<String, Vec<Credential>>,
}

impl CredentialPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the pools for every configured backend, resolving `${ENV_VAR}`
    /// references. Unresolvable slots are dropped here.
    pub fn from_config(config: &BackendsConfig) -> Self {
        let mut pool = Self::new();
        pool.insert(GEMINI_POOL, resolve_slots(&config.gemini.api_keys));
        pool.insert(DETECTION_POOL, resolve_slots(&config.detection.api_keys));
        pool
    }

    /// Register the slots of one pool, replacing any previous entry.
    pub fn insert<I, S>(&mut self, pool: &str, slots: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = slots.into_iter().map(Credential::new).collect();
        self.pools.insert(pool.to_string(), slots);
    }

    /// Pick one non-empty credential from `pool` uniformly at random.
    ///
    /// Returns `None` when the pool has no usable slot or was never
    /// configured at all.
    pub fn select(&self, pool: &str) -> Option<&Credential> {
        let valid: Vec<&Credential> = self
            .pools
            .get(pool)
            .map(|slots| slots.iter().filter(|c| !c.0.is_empty()).collect())
            .unwrap_or_default();
        valid.choose(&mut rand::thread_rng()).copied()
    }

    /// Number of usable credentials in `pool`.
    pub fn available(&self, pool: &str) -> usize {
        self.pools
            .get(pool)
            .map_or(0, |slots| slots.iter().filter(|c| !c.0.is_empty()).count())
    }
}

fn resolve_slots(slots: &[String]) -> Vec<String> {
    slots.iter().filter_map(|s| resolve_env_var(s)).collect()
}
