//! The consumer loop: `Disconnected → Connecting → Consuming → Disconnected`,
//! terminated only by an explicit stop signal.
//!
//! Per-message failures are isolated inside [`dispatch`](ConsumerLoop) so one
//! poisoned message never stops consumption of the next; only broker-level
//! errors restart the loop from `Disconnected`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use docket_broker::BrokerConnection;
use docket_core::{defaults, Envelope, Error, Result, TaskRequest, TaskResponse};

use crate::handler::TaskHandler;

const CONSUMER_TAG: &str = "docket-worker";

/// What an inbound message turned out to be.
#[derive(Debug)]
pub enum Classification {
    Request(TaskRequest),
    Response(TaskResponse),
    Unrecognized(String),
}

/// Classify a raw inbound payload by its tagged envelope.
///
/// Decode failures and unexpected kinds are unrecognized, never an error
/// that could stop the loop.
pub fn classify(payload: &[u8]) -> Classification {
    match Envelope::decode(payload) {
        Ok(Envelope::Request(task)) => Classification::Request(task),
        Ok(Envelope::Response(response)) => Classification::Response(response),
        Ok(Envelope::Error(_)) => {
            Classification::Unrecognized("error envelope on request queue".to_string())
        }
        Err(e) => Classification::Unrecognized(e.to_string()),
    }
}

/// Handle for stopping a running consumer loop from another context, e.g. a
/// signal handler.
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    stop_notify: Arc<Notify>,
}

impl StopHandle {
    /// Clear the running flag and wake the loop if it is blocked waiting for
    /// a message.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.stop_notify.notify_waiters();
    }
}

/// Single-threaded pull-based consumer over the request queue.
///
/// Messages are auto-acknowledged on delivery (at-most-once per delivery
/// attempt); the task handler's own error path compensates, not broker
/// redelivery. A message is processed to completion, including the inference
/// call, before the next one is awaited.
pub struct ConsumerLoop {
    connection: Arc<BrokerConnection>,
    handler: Arc<TaskHandler>,
    running: Arc<AtomicBool>,
    stop_notify: Arc<Notify>,
}

impl ConsumerLoop {
    pub fn new(connection: Arc<BrokerConnection>, handler: Arc<TaskHandler>) -> Self {
        Self {
            connection,
            handler,
            running: Arc::new(AtomicBool::new(true)),
            stop_notify: Arc::new(Notify::new()),
        }
    }

    /// Get a handle for stopping the loop.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: self.running.clone(),
            stop_notify: self.stop_notify.clone(),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run until stopped.
    ///
    /// Outer iterations reconnect after any broker-level failure with a
    /// fixed sleep between attempts so a dead broker never turns into a
    /// tight failure loop.
    pub async fn run(&self) {
        let backoff = Duration::from_millis(self.connection.config().reconnect_backoff_ms);
        info!(queue = defaults::QUEUE_REQUESTS, "Consumer loop started");

        while self.is_running() {
            if let Err(e) = self.connection.connect().await {
                warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "Connect failed, retrying");
                sleep(backoff).await;
                continue;
            }

            match self.consume().await {
                Ok(()) => break,
                Err(e) => {
                    warn!(error = %e, "Broker-level failure, restarting consumer");
                    self.restart_delay().await;
                }
            }
        }

        self.connection.close().await;
        info!("Consumer loop terminated");
    }

    /// Discard the stale connection and wait the fixed backoff before the
    /// next connect attempt.
    ///
    /// A broker that accepts connections but fails the consume promptly
    /// would otherwise turn into a tight connect/declare/fail spin, leaking
    /// unclosed connections along the way.
    async fn restart_delay(&self) {
        self.connection.close().await;
        let backoff = Duration::from_millis(self.connection.config().reconnect_backoff_ms);
        sleep(backoff).await;
    }

    /// Consume from the request queue until stop or broker failure.
    ///
    /// Returns `Ok(())` only when a stop was requested; any broker-level
    /// error returns `Err` so the outer loop restarts from disconnected.
    async fn consume(&self) -> Result<()> {
        let channel = self.connection.channel().await?;
        let mut consumer = channel
            .basic_consume(
                defaults::QUEUE_REQUESTS,
                CONSUMER_TAG,
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        let mut shutdown = self.connection.subscribe_shutdown();

        info!(queue = defaults::QUEUE_REQUESTS, "Waiting for messages");

        loop {
            if !self.is_running() {
                return Ok(());
            }

            tokio::select! {
                _ = self.stop_notify.notified() => {
                    return Ok(());
                }
                reason = shutdown.recv() => {
                    let reason = reason.unwrap_or_else(|_| "shutdown signal lost".to_string());
                    return Err(Error::Connection(reason));
                }
                delivery = consumer.next() => {
                    match delivery {
                        Some(Ok(delivery)) => self.dispatch(&delivery.data).await,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(Error::Connection("consumer stream ended".to_string())),
                    }
                }
            }
        }
    }

    /// Classify one inbound message and hand requests to the task handler.
    ///
    /// This is the per-message isolation point: nothing below it can
    /// terminate the loop.
    async fn dispatch(&self, payload: &[u8]) {
        match classify(payload) {
            Classification::Request(task) => self.handler.handle(task).await,
            Classification::Response(response) => {
                debug!(
                    conversation_id = %response.conversation_id,
                    "Response envelope on request queue, ignoring"
                );
            }
            Classification::Unrecognized(reason) => {
                warn!(
                    reason = %reason,
                    payload_len = payload.len(),
                    "Skipping unrecognized message"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use docket_broker::{BrokerConfig, Publisher, QueuePublisher, RecordingPublisher};
    use docket_core::{ErrorRecord, ResultStatus};
    use docket_inference::MockBackend;
    use docket_store::{MemoryResultStore, ResultStore};
    use serde_json::json;

    fn request_payload(conversation_id: &str) -> Vec<u8> {
        serde_json::to_vec(&Envelope::Request(TaskRequest {
            conversation_id: conversation_id.to_string(),
            image_url: "aGVsbG8=".to_string(),
            options: BTreeMap::new(),
        }))
        .unwrap()
    }

    #[test]
    fn test_classify_request() {
        let payload = request_payload("abc");
        match classify(&payload) {
            Classification::Request(task) => assert_eq!(task.conversation_id, "abc"),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_response() {
        let payload = serde_json::to_vec(&Envelope::Response(TaskResponse {
            conversation_id: "abc".to_string(),
            json_data: json!({"total": "10.00"}),
            status: ResultStatus::Completed,
        }))
        .unwrap();
        assert!(matches!(classify(&payload), Classification::Response(_)));
    }

    #[test]
    fn test_classify_error_envelope_is_unrecognized() {
        let payload =
            serde_json::to_vec(&Envelope::Error(ErrorRecord::new("abc", "boom"))).unwrap();
        assert!(matches!(
            classify(&payload),
            Classification::Unrecognized(_)
        ));
    }

    #[test]
    fn test_classify_non_json_is_unrecognized() {
        assert!(matches!(
            classify(b"not json at all"),
            Classification::Unrecognized(_)
        ));
    }

    #[test]
    fn test_classify_unknown_kind_is_unrecognized() {
        let payload = br#"{"kind": "telemetry", "body": {}}"#;
        assert!(matches!(
            classify(payload),
            Classification::Unrecognized(_)
        ));
    }

    fn test_loop() -> (ConsumerLoop, Arc<MemoryResultStore>, Arc<RecordingPublisher>) {
        let connection = Arc::new(BrokerConnection::new(BrokerConfig::default()));
        let store = Arc::new(MemoryResultStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let handler = Arc::new(TaskHandler::new(
            Arc::new(MockBackend::new(r#"{"total": "10.00"}"#)),
            store.clone(),
            publisher.clone(),
        ));
        (ConsumerLoop::new(connection, handler), store, publisher)
    }

    #[tokio::test]
    async fn test_malformed_message_does_not_stop_subsequent_processing() {
        let (consumer, store, _publisher) = test_loop();

        // Poison message first, valid message second; the valid one must
        // still be processed.
        consumer.dispatch(b"\xff\xfe garbage").await;
        consumer.dispatch(&request_payload("abc")).await;

        let record = store.get("abc").await.unwrap().unwrap();
        assert_eq!(record.status, ResultStatus::Completed);
    }

    #[tokio::test]
    async fn test_response_message_is_ignored_not_processed() {
        let (consumer, store, publisher) = test_loop();

        let payload = serde_json::to_vec(&Envelope::Response(TaskResponse {
            conversation_id: "abc".to_string(),
            json_data: json!({}),
            status: ResultStatus::Completed,
        }))
        .unwrap();
        consumer.dispatch(&payload).await;

        assert!(store.get("abc").await.unwrap().is_none());
        assert!(publisher.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_handle_clears_running_flag() {
        let (consumer, _store, _publisher) = test_loop();
        assert!(consumer.is_running());
        consumer.stop_handle().stop();
        assert!(!consumer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_broker_failure_waits_full_backoff() {
        let connection = Arc::new(BrokerConnection::new(
            BrokerConfig::default().with_reconnect_backoff(5000),
        ));
        let store = Arc::new(MemoryResultStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let handler = Arc::new(TaskHandler::new(
            Arc::new(MockBackend::new("{}")),
            store,
            publisher,
        ));
        let consumer = ConsumerLoop::new(connection, handler);

        let start = tokio::time::Instant::now();
        consumer.restart_delay().await;
        assert!(start.elapsed() >= Duration::from_millis(5000));
        // Stale resources are discarded before the next connect attempt.
        assert!(!consumer.connection.is_healthy().await);
    }

    #[tokio::test]
    async fn test_run_exits_when_stopped_before_start() {
        let (consumer, _store, _publisher) = test_loop();
        consumer.stop_handle().stop();
        // Must return without a broker in reach.
        consumer.run().await;
    }

    // Publisher implements the same seam the handler publishes through; a
    // type-level check that the real publisher satisfies it.
    #[test]
    fn test_publisher_satisfies_queue_publisher_seam() {
        fn assert_seam<T: QueuePublisher>() {}
        assert_seam::<Publisher>();
        assert_seam::<RecordingPublisher>();
    }
}
