//! Structured logging field name constants for the docket pipeline.
//!
//! All crates use these constants for consistent structured logging fields so
//! log aggregation tools can query by standardized names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |

/// Conversation/task id propagated from gateway through worker to store.
pub const CONVERSATION_ID: &str = "conversation_id";

/// Queue name an operation targets.
pub const QUEUE: &str = "queue";

/// Component within the worker.
/// Examples: "connection", "publisher", "consumer", "handler", "store"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "connect", "publish", "consume", "handle", "put"
pub const OPERATION: &str = "op";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte length of an inbound message payload.
pub const PAYLOAD_LEN: &str = "payload_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
