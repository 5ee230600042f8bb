//! Inference backend trait and OpenAI-compatible chat-completions client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use docket_core::{bounded_excerpt, defaults, Error, Result};

use crate::prompt;

/// Backend for extracting structured data from images.
///
/// All transport-level failures (non-success status, timeout, network error)
/// surface as [`Error::Inference`].
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run extraction over an image payload.
    ///
    /// `image` is either an http(s) URL or an already-base64-encoded blob.
    /// Returns the raw model text, possibly wrapped in Markdown fencing.
    async fn extract(&self, image: &str, options: &BTreeMap<String, String>) -> Result<String>;

    /// Check if the backend is reachable.
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Configuration for the chat-completions backend.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Full chat-completions endpoint URL.
    pub url: String,
    /// Vision model name.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Optional bearer token.
    pub api_key: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: defaults::INFERENCE_URL.to_string(),
            model: defaults::INFERENCE_MODEL.to_string(),
            timeout_secs: defaults::INFERENCE_TIMEOUT_SECS,
            api_key: None,
        }
    }
}

impl InferenceConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `INFERENCE_URL` | `http://localhost:1234/v1/chat/completions` |
    /// | `INFERENCE_MODEL` | `gemma-3-4b-it` |
    /// | `INFERENCE_TIMEOUT_SECS` | `120` |
    /// | `INFERENCE_API_KEY` | unset |
    pub fn from_env() -> Self {
        let url = std::env::var(defaults::ENV_INFERENCE_URL)
            .unwrap_or_else(|_| defaults::INFERENCE_URL.to_string());
        let model = std::env::var(defaults::ENV_INFERENCE_MODEL)
            .unwrap_or_else(|_| defaults::INFERENCE_MODEL.to_string());
        let timeout_secs = std::env::var(defaults::ENV_INFERENCE_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::INFERENCE_TIMEOUT_SECS);
        let api_key = std::env::var(defaults::ENV_INFERENCE_API_KEY).ok();

        Self {
            url,
            model,
            timeout_secs,
            api_key,
        }
    }

    /// Set the endpoint URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the request timeout in seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

/// OpenAI-compatible chat-completions vision backend.
pub struct ChatCompletionsBackend {
    config: InferenceConfig,
    client: reqwest::Client,
}

impl ChatCompletionsBackend {
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(InferenceConfig::from_env())
    }

    /// Resolve the image payload to base64.
    ///
    /// An http(s) URL is downloaded and encoded; anything else is assumed to
    /// be base64 already.
    async fn resolve_image(&self, image: &str) -> Result<String> {
        if image.starts_with("http://") || image.starts_with("https://") {
            let response = self
                .client
                .get(image)
                .timeout(Duration::from_secs(self.config.timeout_secs))
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(Error::Inference(format!(
                    "image download returned {}",
                    response.status()
                )));
            }
            let bytes = response.bytes().await?;
            Ok(base64::engine::general_purpose::STANDARD.encode(&bytes))
        } else {
            Ok(image.to_string())
        }
    }
}

#[async_trait]
impl InferenceBackend for ChatCompletionsBackend {
    async fn extract(&self, image: &str, options: &BTreeMap<String, String>) -> Result<String> {
        let image_b64 = self.resolve_image(image).await?;

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: vec![ContentPart::Text {
                        text: prompt::build_system_prompt(options),
                    }],
                },
                ChatMessage {
                    role: "user",
                    content: vec![
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: format!("data:image/jpeg;base64,{image_b64}"),
                            },
                        },
                        ContentPart::Text {
                            text: prompt::USER_INSTRUCTION.to_string(),
                        },
                    ],
                },
            ],
            temperature: defaults::INFERENCE_TEMPERATURE,
            max_tokens: defaults::INFERENCE_MAX_TOKENS,
            stream: false,
        };

        let mut builder = self
            .client
            .post(&self.config.url)
            .json(&request)
            .timeout(Duration::from_secs(self.config.timeout_secs));
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "inference API returned {}: {}",
                status,
                bounded_excerpt(&body, defaults::EXCERPT_MAX_CHARS)
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("undecodable inference response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Inference("inference response had no choices".to_string()))?;

        debug!(
            model = %self.config.model,
            response_len = content.len(),
            "Inference call completed"
        );
        Ok(content)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = self.config.url.replace("/chat/completions", "/models");
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
