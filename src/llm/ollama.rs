//! Ollama HTTP client for local model inference
//!
//! Talks to the Ollama `/api/chat` endpoint with streaming disabled, so every
//! request yields exactly one assistant message.
//!
//! # Example
//!
//! ```no_run
//! use toolchat::llm::{ChatMessage, LLMClient, LLMRequest, OllamaClient};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::with_timeout(
//!     "http://localhost:11434".to_string(),
//!     "gemma3:12b".to_string(),
//!     Duration::from_secs(60),
//! )?;
//!
//! if client.health_check().await? {
//!     let reply = client
//!         .chat(LLMRequest::new(vec![ChatMessage::user("Hello")]))
//!         .await?;
//!     println!("{}", reply.content);
//! }
//! # Ok(())
//! # }
//! ```

use super::client::LLMClient;
use super::error::BackendError;
use super::types::{ChatMessage, LLMRequest, LLMResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default request timeout for Ollama API calls
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Timeout for the lightweight availability probe
const HEALTH_TIMEOUT_SECS: u64 = 2;

/// Ollama client for local model inference
///
/// # Thread Safety
///
/// The client is thread-safe and can be shared across concurrent chats using `Arc`.
pub struct OllamaClient {
    /// Ollama API endpoint URL, without trailing slash
    endpoint: String,

    /// Model name to use for inference
    model: String,

    /// Shared HTTP client with connection pooling
    http_client: Client,

    /// Request timeout duration
    timeout: Duration,
}

impl OllamaClient {
    /// Creates a new Ollama client with default timeout
    pub fn new(endpoint: String, model: String) -> Result<Self, BackendError> {
        Self::with_timeout(endpoint, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new Ollama client with custom timeout
    pub fn with_timeout(
        endpoint: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http_client = Client::builder().timeout(timeout).build().map_err(|e| {
            BackendError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            }
        })?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            http_client,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Lists the models installed on the Ollama server
    pub async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/api/tags", self.endpoint);

        let response = self
            .http_client
            .get(&url)
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(BackendError::ApiError {
                message: format!("HTTP {} from {}", status, url),
                status_code: Some(status.as_u16()),
            });
        }

        let tags: OllamaTags = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse {
                message: format!("JSON parse error: {}", e),
                raw_response: None,
            })?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn map_request_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            error!("Ollama request timed out after {:?}", self.timeout);
            BackendError::TimeoutError {
                seconds: self.timeout.as_secs(),
            }
        } else if e.is_connect() {
            error!("Cannot connect to Ollama at {}", self.endpoint);
            BackendError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else {
            error!("Ollama request error: {}", e);
            BackendError::NetworkError {
                message: format!("Request failed: {}", e),
            }
        }
    }

    fn build_request(&self, request: &LLMRequest) -> OllamaChatRequest {
        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        OllamaChatRequest {
            model: self.model.clone(),
            messages: request.messages.clone(),
            stream: false,
            options,
        }
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = self.build_request(&request);

        debug!(
            model = %self.model,
            messages = body.messages.len(),
            "Sending chat request to Ollama"
        );

        let start = Instant::now();

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let elapsed = start.elapsed();

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            error!("Ollama API returned error status {}: {}", status, text);

            if status.as_u16() == 404 && text.contains("model") {
                return Err(BackendError::ModelNotFound {
                    model: self.model.clone(),
                });
            }

            return Err(BackendError::ApiError {
                message: format!("HTTP {}: {}", status, text),
                status_code: Some(status.as_u16()),
            });
        }

        let chat_response: OllamaChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Ollama response: {}", e);
            BackendError::InvalidResponse {
                message: format!("JSON parse error: {}", e),
                raw_response: None,
            }
        })?;

        if !chat_response.done {
            warn!("Ollama response indicates incomplete generation");
        }

        info!(
            "Ollama chat completed in {:.2}s (model={})",
            elapsed.as_secs_f64(),
            self.model
        );

        debug!(
            "Ollama stats: prompt_tokens={}, eval_tokens={}, total_duration={:?}",
            chat_response.prompt_eval_count.unwrap_or(0),
            chat_response.eval_count.unwrap_or(0),
            chat_response.total_duration
        );

        Ok(LLMResponse::text(chat_response.message.content, elapsed))
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model_info(&self) -> Option<String> {
        Some(format!("{} @ {}", self.model, self.endpoint))
    }

    /// Makes a lightweight request to `/api/tags`
    ///
    /// Returns `Ok(false)` when the server is unreachable or times out, and
    /// `Err` only for unexpected transport errors.
    async fn health_check(&self) -> Result<bool, BackendError> {
        let url = format!("{}/api/tags", self.endpoint);

        debug!("Checking Ollama health at {}", url);

        match self
            .http_client
            .get(&url)
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(response) => {
                let is_healthy = response.status().is_success();
                if is_healthy {
                    info!("Ollama health check successful");
                } else {
                    warn!(
                        "Ollama health check failed with status: {}",
                        response.status()
                    );
                }
                Ok(is_healthy)
            }
            Err(e) => {
                if e.is_timeout() {
                    warn!("Ollama health check timed out");
                    Ok(false)
                } else if e.is_connect() {
                    warn!("Cannot connect to Ollama at {}", self.endpoint);
                    Ok(false)
                } else {
                    error!("Ollama health check error: {}", e);
                    Err(BackendError::NetworkError {
                        message: format!("Health check failed: {}", e),
                    })
                }
            }
        }
    }
}

impl fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Request body for the Ollama chat API
#[derive(Debug, Clone, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

/// Sampling options forwarded to the model
#[derive(Debug, Clone, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Response body from the Ollama chat API
#[derive(Debug, Clone, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,

    #[serde(default)]
    done: bool,

    /// Total duration in nanoseconds
    #[serde(default)]
    total_duration: Option<u64>,

    #[serde(default)]
    prompt_eval_count: Option<u32>,

    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaModel {
    name: String,
}
