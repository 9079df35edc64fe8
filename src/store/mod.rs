//! Shared breaker state storage
//!
//! Breaker state lives in an external key-value store so that every process
//! protecting the same endpoint sees the same circuit. Each breaker is one
//! hash keyed by `"inbound:"` or `"outbound:"` plus the normalized endpoint,
//! holding the fields listed in [`fields`].
//!
//! - [`RedisStateStore`]: `HGETALL` / `HSET` against a shared Redis
//! - [`MemoryStateStore`]: process-local map, for tests and single-instance use

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

pub use memory::MemoryStateStore;
pub use self::redis::RedisStateStore;

/// Field names of a persisted breaker
pub mod fields {
    pub const STATE: &str = "state";
    pub const FAILURE_COUNT: &str = "failureCount";
    pub const SUCCESS_COUNT: &str = "successCount";
    pub const LAST_FAILURE_TIME: &str = "lastFailureTime";
    pub const MANUAL_OVERRIDE: &str = "manualOverride";
    pub const OVERRIDE_CONFIGURED: &str = "overrideConfigured";
}

/// Errors raised by a state store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("State store unavailable: {0}")]
    Unavailable(String),
}

/// Capability to load and save the field map of one breaker
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load every field stored under `key`. A missing key yields an empty map.
    async fn load_fields(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Write `fields` under `key`, overwriting fields with the same name.
    async fn save_fields(&self, key: &str, fields: &HashMap<String, String>)
        -> Result<(), StoreError>;
}
