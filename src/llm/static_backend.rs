//! Scripted backend for tests and offline dry runs.
//!
//! Returns queued responses in order and counts every call, which is what
//! the test suite uses to assert "no LLM call happened before X" and
//! "exactly one retry occurred".

use super::{CompletionRequest, LlmBackend, LlmError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub struct StaticBackend {
    responses: Mutex<VecDeque<String>>,
    calls: AtomicU64,
}

impl StaticBackend {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicU64::new(0),
        }
    }

    /// Queue another response behind the existing ones.
    pub fn push_response(&self, response: &str) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response.to_string());
        }
    }

    /// Responses still queued (unconsumed).
    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmBackend for StaticBackend {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        next.ok_or(LlmError::EmptyResponse)
    }

    fn backend_name(&self) -> &'static str {
        "static"
    }

    fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responses_returned_in_order() {
        let backend = StaticBackend::new(vec!["one".to_string(), "two".to_string()]);
        let request = CompletionRequest {
            system: String::new(),
            user: String::new(),
            temperature: 0.0,
            max_tokens: 10,
        };
        assert_eq!(backend.complete(&request).await.unwrap(), "one");
        assert_eq!(backend.complete(&request).await.unwrap(), "two");
        assert!(matches!(
            backend.complete(&request).await,
            Err(LlmError::EmptyResponse)
        ));
        assert_eq!(backend.call_count(), 3);
    }
}
