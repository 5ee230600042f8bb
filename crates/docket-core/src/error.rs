//! Error types for the docket pipeline.

use thiserror::Error;

/// Result type alias using docket's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for docket operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Broker transport unreachable or lost.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Broker rejected or could not accept a message.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Inbound payload not decodable or not classifiable.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// External inference call failed (status, timeout, network).
    #[error("Inference error: {0}")]
    Inference(String),

    /// Inference output did not parse as structured data.
    /// Carries a bounded excerpt of the raw text, never the full blob.
    #[error("Malformed inference output: {0}")]
    MalformedOutput(String),

    /// Result store operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<lapin::Error> for Error {
    fn from(e: lapin::Error) -> Self {
        Error::Connection(e.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Store(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Inference(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connection() {
        let err = Error::Connection("broker unreachable".to_string());
        assert_eq!(err.to_string(), "Connection error: broker unreachable");
    }

    #[test]
    fn test_error_display_publish() {
        let err = Error::Publish("channel closed".to_string());
        assert_eq!(err.to_string(), "Publish error: channel closed");
    }

    #[test]
    fn test_error_display_malformed_message() {
        let err = Error::MalformedMessage("not json".to_string());
        assert_eq!(err.to_string(), "Malformed message: not json");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("model timeout".to_string());
        assert_eq!(err.to_string(), "Inference error: model timeout");
    }

    #[test]
    fn test_error_display_malformed_output() {
        let err = Error::MalformedOutput("excerpt...".to_string());
        assert_eq!(err.to_string(), "Malformed inference output: excerpt...");
    }

    #[test]
    fn test_error_display_store() {
        let err = Error::Store("redis down".to_string());
        assert_eq!(err.to_string(), "Store error: redis down");
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
