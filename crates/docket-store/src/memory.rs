//! In-memory result store for deterministic testing.
//!
//! Mirrors the Redis store's contract (TTL, last-write-wins, atomic
//! overwrite) without an external process. Also usable as a single-process
//! fallback in development.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use docket_core::{defaults, ResultRecord, Result};

use crate::ResultStore;

struct Entry {
    record: ResultRecord,
    expires_at: Instant,
}

/// Result store backed by a TTL'd in-memory map.
pub struct MemoryResultStore {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl MemoryResultStore {
    /// Create a store with the default one-hour TTL.
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(defaults::RESULT_TTL_SECS))
    }

    /// Create a store with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of unexpired records currently held.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn put(&self, conversation_id: &str, record: &ResultRecord) -> Result<()> {
        let entry = Entry {
            record: record.clone(),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries
            .write()
            .await
            .insert(conversation_id.to_string(), entry);
        Ok(())
    }

    async fn get(&self, conversation_id: &str) -> Result<Option<ResultRecord>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(conversation_id)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.record.clone()))
    }
}
