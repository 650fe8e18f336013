//! Ollama-backed inference engine implementation
//!
//! Implements the `InferenceEngine` trait against Ollama's local API. The
//! per-session context handle is Ollama's `context` token array from
//! `/api/generate`: the engine returns it with every completion and expects
//! it back on the next turn, which makes it a genuinely stateful
//! per-conversation resource that the session store can own and release.
//!
//! Responses are requested non-streaming; the context array and token
//! counts only arrive with the final message anyway.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::{EngineContext, EngineError, InferenceEngine};

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

/// Configuration for the Ollama engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaEngineConfig {
    /// Base URL of the Ollama server
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model to generate with (e.g. "llama3.2:latest")
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for OllamaEngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Request body for /api/generate
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    /// Model to use for completion
    model: &'a str,
    /// The user message for this turn
    prompt: &'a str,
    /// System instruction applied to this turn
    system: &'a str,
    /// Conversation state tokens from the previous turn
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a [i64]>,
    /// Non-streaming: one JSON object with the full response
    stream: bool,
}

/// Response body from /api/generate
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    /// Generated text
    response: String,
    /// Updated conversation state tokens
    context: Option<Vec<i64>>,
    /// Prompt token count
    prompt_eval_count: Option<u32>,
    /// Completion token count
    eval_count: Option<u32>,
}

/// Response body from /api/tags
#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// Shared Ollama engine handle, created once at startup
#[derive(Debug, Clone)]
pub struct OllamaEngine {
    config: OllamaEngineConfig,
    client: Client,
}

impl OllamaEngine {
    /// Connects to the Ollama server and verifies the configured model is
    /// available.
    ///
    /// Failure here is fatal to startup: the gateway refuses to serve
    /// without a live engine.
    pub async fn connect(config: OllamaEngineConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| EngineError::init(format!("failed to build HTTP client: {}", e)))?;

        let engine = Self { config, client };
        let models = engine.list_models().await.map_err(|e| {
            EngineError::init(format!(
                "cannot reach engine at {}: {}",
                engine.config.base_url, e
            ))
        })?;

        if !models.iter().any(|m| m == &engine.config.model) {
            return Err(EngineError::init(format!(
                "model '{}' not found on engine (available: {})",
                engine.config.model,
                models.join(", ")
            )));
        }

        info!(
            base_url = %engine.config.base_url,
            model = %engine.config.model,
            "Engine connected"
        );
        Ok(engine)
    }

    /// Lists model names known to the server
    async fn list_models(&self) -> Result<Vec<String>, EngineError> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(EngineError::api(
                response.status().as_u16(),
                response.text().await.unwrap_or_default(),
            ));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| EngineError::malformed(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait::async_trait]
impl InferenceEngine for OllamaEngine {
    async fn create_context(&self) -> Result<Box<dyn EngineContext>, EngineError> {
        Ok(Box::new(OllamaContext {
            config: self.config.clone(),
            client: self.client.clone(),
            tokens: None,
        }))
    }

    fn engine_name(&self) -> &'static str {
        "ollama"
    }
}

/// One conversation's engine-side state: the context token array carried
/// between generate calls.
struct OllamaContext {
    config: OllamaEngineConfig,
    client: Client,
    tokens: Option<Vec<i64>>,
}

#[async_trait::async_trait]
impl EngineContext for OllamaContext {
    async fn prompt(&mut self, system: &str, text: &str) -> Result<String, EngineError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let request = GenerateRequest {
            model: &self.config.model,
            prompt: text,
            system,
            context: self.tokens.as_deref(),
            stream: false,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::NOT_FOUND => {
                    EngineError::api(404, format!("model '{}': {}", self.config.model, body))
                }
                _ => EngineError::api(status.as_u16(), body),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| EngineError::malformed(e.to_string()))?;

        debug!(
            model = %self.config.model,
            prompt_tokens = ?body.prompt_eval_count,
            completion_tokens = ?body.eval_count,
            context_len = body.context.as_ref().map(|c| c.len()).unwrap_or(0),
            "Engine turn completed"
        );

        // Carry the updated conversation state into the next turn
        self.tokens = body.context;
        Ok(body.response)
    }

    async fn release(&mut self) -> Result<(), EngineError> {
        // Ollama keeps no server-side handle per context; dropping the
        // token array is the release.
        let freed = self.tokens.take().map(|t| t.len()).unwrap_or(0);
        debug!(context_tokens = freed, "Engine context released");
        Ok(())
    }
}
