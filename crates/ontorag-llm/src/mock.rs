//! Scripted completion service for tests and offline runs.

use crate::{CompletionService, LLMError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns canned responses in order, cycling when they run out.
///
/// Every prompt is recorded so tests can assert on what was sent.
pub struct MockCompletion {
    responses: Vec<String>,
    response_idx: AtomicUsize,
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            response_idx: AtomicUsize::new(0),
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// A service whose every call fails with a network error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, LLMError> {
        self.prompts.lock().push(prompt.to_string());
        if self.fail {
            return Err(LLMError::Network("mock failure".to_string()));
        }
        if self.responses.is_empty() {
            return Ok(String::new());
        }
        let idx = self.response_idx.fetch_add(1, Ordering::SeqCst);
        Ok(self.responses[idx % self.responses.len()].clone())
    }

    fn model(&self) -> &str {
        "mock"
    }
}
