//! Extraction task handler.
//!
//! Everything that can go wrong while processing a single task is converted
//! into a failed [`ResultRecord`] here; no error ever propagates back into
//! the consumer loop. Auto-acknowledged delivery means the broker will not
//! redeliver a message whose handling failed, so this error path is the only
//! record a poller will ever see for a failed task.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as JsonValue;
use tracing::{error, info, warn};

use docket_broker::QueuePublisher;
use docket_core::{
    defaults, Envelope, Error, ErrorRecord, Result, ResultRecord, TaskRequest, TaskResponse,
};
use docket_inference::{parse_extraction, InferenceBackend};
use docket_store::ResultStore;

/// Handles one validated extraction task end to end.
pub struct TaskHandler {
    backend: Arc<dyn InferenceBackend>,
    store: Arc<dyn ResultStore>,
    publisher: Arc<dyn QueuePublisher>,
}

impl TaskHandler {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        store: Arc<dyn ResultStore>,
        publisher: Arc<dyn QueuePublisher>,
    ) -> Self {
        Self {
            backend,
            store,
            publisher,
        }
    }

    /// Process a task to completion.
    ///
    /// Never returns an error: every failure, including a missing
    /// conversation id, becomes a failed record under the task's id or the
    /// sentinel id.
    pub async fn handle(&self, task: TaskRequest) {
        let start = Instant::now();
        let conversation_id = if task.conversation_id.is_empty() {
            defaults::UNKNOWN_CONVERSATION_ID.to_string()
        } else {
            task.conversation_id.clone()
        };

        info!(
            conversation_id = %conversation_id,
            payload_len = task.image_url.len(),
            "Processing extraction task"
        );

        match self.process(&task).await {
            Ok(json_data) => {
                self.record_success(&conversation_id, json_data).await;
                info!(
                    conversation_id = %conversation_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Extraction completed"
                );
            }
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Extraction failed"
                );
                self.record_failure(&conversation_id, &e.to_string()).await;
            }
        }
    }

    /// Invoke inference, strip fencing, parse.
    async fn process(&self, task: &TaskRequest) -> Result<JsonValue> {
        let raw = self.backend.extract(&task.image_url, &task.options).await?;
        let value = parse_extraction(&raw)?;

        // A model that could not read the image reports its own error as a
        // well-formed {"error": …} object; that is still a failed task,
        // whatever shape the error value takes.
        if let Some(reported) = value.get("error") {
            let message = match reported.as_str() {
                Some(s) => s.to_string(),
                None => reported.to_string(),
            };
            return Err(Error::Inference(message));
        }

        Ok(value)
    }

    /// Write the completed record and publish the response.
    ///
    /// The store write is last-write-wins, so a redelivered task safely
    /// overwrites an earlier record instead of corrupting it.
    async fn record_success(&self, conversation_id: &str, json_data: JsonValue) {
        let record = ResultRecord::completed(conversation_id, json_data.clone());
        if let Err(e) = self.store.put(conversation_id, &record).await {
            error!(conversation_id, error = %e, "Failed to store completed record");
        }

        let envelope = Envelope::Response(TaskResponse {
            conversation_id: conversation_id.to_string(),
            json_data,
            status: record.status,
        });
        if let Err(e) = self
            .publisher
            .publish_envelope(defaults::QUEUE_RESPONSES, &envelope, true)
            .await
        {
            error!(conversation_id, error = %e, "Failed to publish response");
        }
    }

    /// Write the failed record and publish to the dedicated error queue.
    async fn record_failure(&self, conversation_id: &str, message: &str) {
        let record = ResultRecord::failed(conversation_id, message);
        if let Err(e) = self.store.put(conversation_id, &record).await {
            error!(conversation_id, error = %e, "Failed to store failure record");
        }

        let envelope = Envelope::Error(ErrorRecord::new(conversation_id, message));
        if let Err(e) = self
            .publisher
            .publish_envelope(defaults::QUEUE_ERRORS, &envelope, true)
            .await
        {
            error!(conversation_id, error = %e, "Failed to publish error record");
        }
    }
}
