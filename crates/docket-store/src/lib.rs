//! # docket-store
//!
//! Time-bounded key→value result store, keyed by conversation id.
//!
//! Writes are idempotent with last-write-wins semantics, which makes
//! at-least-once delivery from the queue safe to retry. Absence of a record
//! is a normal state (task not yet processed, or expired) and is distinct
//! from a stored `failed` record.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;

use docket_core::{ResultRecord, Result};

pub use memory::MemoryResultStore;
pub use redis_store::{RedisResultStore, StoreConfig};

/// Store of authoritative per-task result records.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Write a record under a conversation id with the store's fixed TTL.
    ///
    /// Overwrite semantics: a second write for the same id fully replaces
    /// the first. Succeeds or fails atomically; no partial write is visible
    /// to a concurrent reader.
    async fn put(&self, conversation_id: &str, record: &ResultRecord) -> Result<()>;

    /// Read the most recently written record for a conversation id.
    ///
    /// `Ok(None)` means not yet processed or past its TTL.
    async fn get(&self, conversation_id: &str) -> Result<Option<ResultRecord>>;
}
