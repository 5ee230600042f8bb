//! Wire and storage models for the docket pipeline.
//!
//! Everything that crosses a queue or lands in the result store is defined
//! here: the tagged [`Envelope`] the producer wraps every message in, the
//! request/response/error bodies, and the [`ResultRecord`] the poll endpoint
//! reads back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::defaults;
use crate::error::{Error, Result};

/// An extraction task submitted by the gateway.
///
/// `image_url` carries either an http(s) URL or an already-base64-encoded
/// image blob; the inference backend resolves which. Immutable after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRequest {
    pub conversation_id: String,
    pub image_url: String,
    /// Free-form extraction options, e.g. `fields` → comma-separated list of
    /// keys the caller wants extracted.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

/// A completed extraction, published to the response queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResponse {
    pub conversation_id: String,
    pub json_data: JsonValue,
    pub status: ResultStatus,
}

/// A failed extraction, published to the dedicated error queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    pub conversation_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(conversation_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Terminal status of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Failed,
}

/// The authoritative per-task record written to the result store.
///
/// For a given conversation id the store always returns the most recently
/// written record (last-write-wins); absence means "not yet processed or
/// expired" and is distinct from `status: failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRecord {
    pub conversation_id: String,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ResultRecord {
    /// Build a completed record carrying the parsed extraction verbatim.
    pub fn completed(conversation_id: impl Into<String>, json_data: JsonValue) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            status: ResultStatus::Completed,
            json_data: Some(json_data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Build a failed record with a human-readable error message.
    pub fn failed(conversation_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            status: ResultStatus::Failed,
            json_data: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Tagged wire envelope set by the producer.
///
/// Serializes as `{"kind": "request" | "response" | "error", "body": …}`,
/// removing shape ambiguity at the consumer. Payloads with an unknown kind
/// or an undecodable body fail deserialization and are classified as
/// unrecognized by the consumer loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Envelope {
    Request(TaskRequest),
    Response(TaskResponse),
    Error(ErrorRecord),
}

impl Envelope {
    /// Decode a raw queue payload into an envelope.
    ///
    /// Non-JSON payloads, unknown kinds, and undecodable bodies all surface
    /// as [`Error::MalformedMessage`].
    pub fn decode(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::MalformedMessage(e.to_string()))
    }
}

/// Truncate raw model output to a bounded, char-boundary-safe excerpt.
///
/// Failure diagnostics must never carry the full raw blob into logs or the
/// result store.
pub fn bounded_excerpt(raw: &str, max_chars: usize) -> String {
    if raw.chars().count() <= max_chars {
        return raw.to_string();
    }
    let truncated: String = raw.chars().take(max_chars).collect();
    format!("{}…", truncated)
}

/// Bounded excerpt at the default length.
pub fn default_excerpt(raw: &str) -> String {
    bounded_excerpt(raw, defaults::EXCERPT_MAX_CHARS)
}
