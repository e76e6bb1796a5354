//! LLM Backend Module
//!
//! Provides a unified interface over OpenAI-compatible completion APIs.
//!
//! ## Architecture
//!
//! - **OpenAiBackend**: chat-completions over HTTP. Prefers Groq when
//!   `GROQ_API_KEY` is set, otherwise OpenAI via `OPENAI_API_KEY`.
//! - **StaticBackend**: scripted responses with a call counter, used by the
//!   test suite and offline dry runs.
//!
//! Every agent invocation is a single request/response call; the only retry
//! machinery is [`call_and_parse`], which re-issues a prompt a bounded number
//! of times when the transport fails or the response is not parseable JSON.

pub mod json;
mod openai;
mod static_backend;

pub use openai::OpenAiBackend;
pub use static_backend::StaticBackend;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::warn;

/// One completion call's parameters.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no API key configured - set GROQ_API_KEY or OPENAI_API_KEY")]
    MissingCredentials,

    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM provider returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("failed to parse LLM output as JSON: {0}")]
    Parse(String),

    #[error("LLM call failed after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Unified trait for LLM backends.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Issue a single completion request and return the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;

    /// Total completion calls issued through this backend.
    fn call_count(&self) -> u64;
}

/// Call the backend and parse the response as JSON, retrying up to
/// `max_retries` additional times on transport failure or malformed output.
///
/// This is the bounded retry from the error handling design: no fallback
/// computation happens here, the caller decides what a failure means.
pub async fn call_and_parse<T: DeserializeOwned>(
    backend: &dyn LlmBackend,
    request: &CompletionRequest,
    max_retries: u32,
) -> Result<T, LlmError> {
    let attempts = max_retries + 1;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match backend.complete(request).await {
            Ok(raw) => match json::parse_lenient::<T>(&raw) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(attempt, error = %e, "LLM response was not parseable JSON");
                    last_error = e.to_string();
                }
            },
            Err(e) => {
                warn!(attempt, error = %e, "LLM call failed");
                last_error = e.to_string();
            }
        }
    }

    Err(LlmError::RetriesExhausted {
        attempts,
        last: last_error,
    })
}
