//! Mock inference backend for deterministic testing.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use docket_core::{Error, Result};

use crate::backend::InferenceBackend;

/// One recorded call to the mock backend.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub image: String,
    pub options: BTreeMap<String, String>,
}

/// Mock inference backend returning a fixed response or a fixed failure.
pub struct MockBackend {
    response: String,
    fail_with: Option<String>,
    model: String,
    calls: Mutex<Vec<MockCall>>,
}

impl MockBackend {
    /// Backend that always returns `response`.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            fail_with: None,
            model: "mock-vision".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Backend that always fails with an inference error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: String::new(),
            fail_with: Some(message.into()),
            model: "mock-vision".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of recorded calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().expect("mock call log poisoned").clone()
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    async fn extract(&self, image: &str, options: &BTreeMap<String, String>) -> Result<String> {
        self.calls
            .lock()
            .expect("mock call log poisoned")
            .push(MockCall {
                image: image.to_string(),
                options: options.clone(),
            });
        match &self.fail_with {
            Some(message) => Err(Error::Inference(message.clone())),
            None => Ok(self.response.clone()),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.fail_with.is_none())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_fixed_response() {
        let backend = MockBackend::new("{\"total\": \"10.00\"}");
        let out = backend.extract("aGVsbG8=", &BTreeMap::new()).await.unwrap();
        assert_eq!(out, "{\"total\": \"10.00\"}");
        assert_eq!(backend.calls().len(), 1);
        assert_eq!(backend.calls()[0].image, "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let backend = MockBackend::failing("model offline");
        let err = backend
            .extract("aGVsbG8=", &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
        assert!(!backend.health_check().await.unwrap());
    }
}
