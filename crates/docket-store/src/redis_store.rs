//! Redis-backed result store.
//!
//! Records are stored as JSON strings under the bare conversation id, with
//! `SET … EX ttl`. A single SET is atomic, so readers never observe a
//! partial write, and rewriting a key is naturally last-write-wins.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `REDIS_URL`: Redis connection URL (default: redis://localhost:6379)
//! - `RESULT_TTL_SECS`: record expiration in seconds (default: 3600)

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use docket_core::{defaults, Error, ResultRecord, Result};

use crate::ResultStore;

/// Configuration for the Redis result store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis endpoint URL.
    pub url: String,
    /// Record TTL in seconds.
    pub ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: defaults::REDIS_URL.to_string(),
            ttl_secs: defaults::RESULT_TTL_SECS,
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables (with defaults).
    pub fn from_env() -> Self {
        let url = std::env::var(defaults::ENV_REDIS_URL)
            .unwrap_or_else(|_| defaults::REDIS_URL.to_string());

        let ttl_secs = std::env::var(defaults::ENV_RESULT_TTL_SECS)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::RESULT_TTL_SECS);

        Self { url, ttl_secs }
    }

    /// Set the Redis URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the record TTL in seconds.
    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }
}

/// Result store backed by Redis.
#[derive(Clone)]
pub struct RedisResultStore {
    connection: ConnectionManager,
    ttl_secs: u64,
}

impl std::fmt::Debug for RedisResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisResultStore")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl RedisResultStore {
    /// Connect to Redis.
    ///
    /// An unreachable store at startup is the one process-fatal condition in
    /// the worker; callers should propagate this error out of `main`.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| Error::Config(format!("invalid Redis URL: {e}")))?;
        let connection = ConnectionManager::new(client).await?;

        info!(ttl_secs = config.ttl_secs, "Result store connected");
        Ok(Self {
            connection,
            ttl_secs: config.ttl_secs,
        })
    }

    /// Record TTL in seconds.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}

#[async_trait]
impl ResultStore for RedisResultStore {
    async fn put(&self, conversation_id: &str, record: &ResultRecord) -> Result<()> {
        let serialized = serde_json::to_string(record)?;
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(conversation_id, serialized, self.ttl_secs)
            .await?;
        debug!(
            conversation_id,
            ttl_secs = self.ttl_secs,
            status = ?record.status,
            "Stored result record"
        );
        Ok(())
    }

    async fn get(&self, conversation_id: &str) -> Result<Option<ResultRecord>> {
        let mut conn = self.connection.clone();
        match conn.get::<_, Option<String>>(conversation_id).await? {
            Some(data) => match serde_json::from_str(&data) {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    warn!(conversation_id, error = %e, "Undecodable record in store");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }
}
