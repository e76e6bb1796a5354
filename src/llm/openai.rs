//! OpenAI-compatible chat-completions backend.
//!
//! Provider selection follows the key hierarchy: Groq first (`GROQ_API_KEY`),
//! then OpenAI (`OPENAI_API_KEY`). Groq speaks the same wire format, so both
//! share one implementation; only the base URL and model name differ.

use super::{CompletionRequest, LlmBackend, LlmError};
use crate::config::ModelConfig;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default Groq model; the configured model name only applies to OpenAI.
const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// HTTP backend for OpenAI-compatible completion endpoints.
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: &'static str,
    api_key: String,
    model: String,
    provider: &'static str,
    calls: AtomicU64,
}

impl OpenAiBackend {
    /// Build a backend from environment keys and model config.
    ///
    /// Returns `MissingCredentials` when neither key is set - a fatal startup
    /// error, reported before any data leaves the machine.
    pub fn from_env(model: &ModelConfig) -> Result<Self, LlmError> {
        let (base_url, api_key, model_name, provider) =
            if let Ok(key) = std::env::var("GROQ_API_KEY") {
                (GROQ_BASE_URL, key, GROQ_DEFAULT_MODEL.to_string(), "groq")
            } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                (OPENAI_BASE_URL, key, model.name.clone(), "openai")
            } else {
                return Err(LlmError::MissingCredentials);
            };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(model.timeout_secs))
            .build()?;

        info!(provider, model = %model_name, "LLM backend ready");

        Ok(Self {
            client,
            base_url,
            api_key,
            model: model_name,
            provider,
            calls: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        debug!(model = %self.model, user_len = request.user.len(), "Issuing completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response.json().await?;
        let content = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(content.to_string())
    }

    fn backend_name(&self) -> &'static str {
        self.provider
    }

    fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}
