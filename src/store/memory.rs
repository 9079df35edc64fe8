use super::{StateStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// In-memory state store
///
/// Shares state between breakers of one process only. Loads and saves can be
/// made to fail, which lets tests exercise the degraded paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    entries: Arc<DashMap<String, HashMap<String, String>>>,
    fail_loads: Arc<AtomicBool>,
    fail_saves: Arc<AtomicBool>,
    saves: Arc<AtomicU64>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent load fail (or succeed again)
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent save fail (or succeed again)
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the fields stored under `key`
    pub fn get(&self, key: &str) -> Option<HashMap<String, String>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Replace the fields stored under `key`
    pub fn insert(&self, key: impl Into<String>, fields: HashMap<String, String>) {
        self.entries.insert(key.into(), fields);
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load_fields(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("load disabled".to_string()));
        }

        Ok(self.get(key).unwrap_or_default())
    }

    async fn save_fields(
        &self,
        key: &str,
        fields: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("save disabled".to_string()));
        }

        debug!(key = key, fields = fields.len(), "Saving breaker fields");
        self.entries
            .entry(key.to_string())
            .or_default()
            .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
