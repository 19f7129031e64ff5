//! services/api/src/adapters/kv.rs
//!
//! A process-local implementation of the `KeyValueStore` port. Entries are
//! held in memory with an expiry instant; expired entries read as absent and
//! are removed by [`MemoryKvAdapter::purge_expired`].
//!
//! State is not shared between processes. Running more than one API instance
//! needs a shared store behind the same port.

use async_trait::async_trait;
use chrono::Duration;
use crm_dashboard_core::ports::{KeyValueStore, PortResult};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

// Upper bound on how long any entry is kept.
const MAX_TTL: std::time::Duration = std::time::Duration::from_secs(366 * 24 * 60 * 60);

struct StoredValue {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryKvAdapter {
    entries: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryKvAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, stored| stored.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired key-value entries");
        }
        removed
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvAdapter {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|stored| stored.expires_at > Instant::now())
            .map(|stored| stored.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> PortResult<()> {
        // Negative TTLs expire immediately.
        let ttl = ttl.to_std().unwrap_or_default().min(MAX_TTL);
        let stored = StoredValue {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), stored);
        Ok(())
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
