//! Durable queue publishing built on the broker connection.

use std::sync::Arc;

use async_trait::async_trait;
use lapin::options::BasicPublishOptions;
use lapin::BasicProperties;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use docket_core::{Envelope, Error, Result};

use crate::connection::BrokerConnection;

/// AMQP delivery mode for a message.
///
/// Mode 2 survives a broker restart; mode 1 is best-effort.
fn delivery_mode(persistent: bool) -> u8 {
    if persistent {
        2
    } else {
        1
    }
}

/// The seam the task handler publishes envelopes through.
///
/// Lets handler tests record publishes instead of talking to a broker.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Publish a tagged envelope to a named durable queue.
    async fn publish_envelope(&self, queue: &str, envelope: &Envelope, persistent: bool)
        -> Result<()>;
}

/// Publishes payloads to named durable queues over the shared connection.
///
/// May be invoked concurrently; channel access is serialized internally so
/// callers never interleave frames on the shared channel.
pub struct Publisher {
    connection: Arc<BrokerConnection>,
    publish_lock: Mutex<()>,
}

impl Publisher {
    pub fn new(connection: Arc<BrokerConnection>) -> Self {
        Self {
            connection,
            publish_lock: Mutex::new(()),
        }
    }

    /// Publish raw bytes to a named queue via the default exchange.
    ///
    /// If the connection is unhealthy, exactly one reconnect is attempted;
    /// if that also fails, the operation fails and the caller decides
    /// whether to raise or drop. No publisher-confirm guarantee is provided;
    /// downstream processing must be idempotent.
    pub async fn publish(&self, queue: &str, payload: &[u8], persistent: bool) -> Result<()> {
        let _guard = self.publish_lock.lock().await;

        if !self.connection.is_healthy().await {
            warn!(queue, "Connection unhealthy before publish, attempting reconnect");
            // Still unhealthy after the one attempt is a failed publish, not
            // a connection error: the caller asked to publish.
            self.connection
                .reconnect()
                .await
                .map_err(|e| Error::Publish(format!("reconnect failed: {e}")))?;
        }

        let channel = self.connection.channel().await?;
        let confirm = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(delivery_mode(persistent)),
            )
            .await
            .map_err(|e| Error::Publish(e.to_string()))?;
        confirm.await.map_err(|e| Error::Publish(e.to_string()))?;

        debug!(queue, payload_len = payload.len(), persistent, "Published message");
        Ok(())
    }

    /// Serialize a value as JSON and publish it.
    ///
    /// Already-serialized text should go through [`publish`](Self::publish)
    /// unchanged instead.
    pub async fn publish_json<T: Serialize>(
        &self,
        queue: &str,
        value: &T,
        persistent: bool,
    ) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish(queue, &payload, persistent).await
    }
}

#[async_trait]
impl QueuePublisher for Publisher {
    async fn publish_envelope(
        &self,
        queue: &str,
        envelope: &Envelope,
        persistent: bool,
    ) -> Result<()> {
        self.publish_json(queue, envelope, persistent).await
    }
}

/// Recording publisher for deterministic tests.
///
/// Stores every envelope instead of talking to a broker; can be configured
/// to fail so error paths are exercised.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Envelope)>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail with a publish error.
    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Snapshot of everything published so far as (queue, envelope) pairs.
    pub async fn published(&self) -> Vec<(String, Envelope)> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl QueuePublisher for RecordingPublisher {
    async fn publish_envelope(
        &self,
        queue: &str,
        envelope: &Envelope,
        _persistent: bool,
    ) -> Result<()> {
        if self.fail {
            return Err(Error::Publish("recording publisher set to fail".to_string()));
        }
        self.published
            .lock()
            .await
            .push((queue.to_string(), envelope.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::BrokerConfig;
    use docket_core::{defaults, ErrorRecord};

    #[tokio::test]
    async fn test_publish_while_disconnected_attempts_exactly_one_reconnect() {
        // Unroutable URL fails fast without a broker.
        let config = BrokerConfig::default()
            .with_url("amqp://127.0.0.1:1/%2f")
            .with_reconnect_backoff(1);
        let connection = Arc::new(BrokerConnection::new(config));
        let mut shutdown = connection.subscribe_shutdown();
        let publisher = Publisher::new(connection);

        let err = publisher
            .publish(defaults::QUEUE_REQUESTS, b"{}", true)
            .await
            .unwrap_err();
        // The failed reconnect surfaces as a publish error to the caller.
        assert!(matches!(err, Error::Publish(_)));

        // One reconnect attempt means exactly one broadcast reason.
        assert!(shutdown.try_recv().is_ok());
        assert!(shutdown.try_recv().is_err());
    }

    #[test]
    fn test_delivery_mode_mapping() {
        assert_eq!(delivery_mode(true), 2);
        assert_eq!(delivery_mode(false), 1);
    }

    #[tokio::test]
    async fn test_recording_publisher_records() {
        let publisher = RecordingPublisher::new();
        let envelope = Envelope::Error(ErrorRecord::new("abc", "boom"));

        publisher
            .publish_envelope(defaults::QUEUE_ERRORS, &envelope, true)
            .await
            .unwrap();

        let published = publisher.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, defaults::QUEUE_ERRORS);
        assert_eq!(published[0].1, envelope);
    }

    #[tokio::test]
    async fn test_recording_publisher_failing() {
        let publisher = RecordingPublisher::failing();
        let envelope = Envelope::Error(ErrorRecord::new("abc", "boom"));

        let err = publisher
            .publish_envelope(defaults::QUEUE_ERRORS, &envelope, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Publish(_)));
        assert!(publisher.published().await.is_empty());
    }
}
