//! LLM Provider Interfaces
//!
//! Abstraction over the two external model capabilities the engine needs:
//!
//! - [`CompletionService`]: prompt in, raw text out. No structural guarantee
//!   on the output; callers must parse defensively.
//! - [`Embedder`]: text in, fixed-length vector out.
//!
//! Implementations:
//! - [`openai::OpenAIClient`]: OpenAI-compatible HTTP API (feature `openai`)
//! - [`token_hash::TokenHashEmbedder`]: deterministic offline embeddings
//! - [`mock::MockCompletion`]: scripted completions for tests

use async_trait::async_trait;

pub mod config;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod retry;
pub mod token_hash;

pub use config::{ConfigError, LLMConfig};
pub use mock::MockCompletion;
#[cfg(feature = "openai")]
pub use openai::OpenAIClient;
pub use retry::RetryPolicy;
pub use token_hash::{TokenHashEmbedder, DEFAULT_TOKEN_HASH_DIM};

#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("Server error ({status}): {body}")]
    Server { status: u16, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LLMError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LLMError::RateLimited { .. } | LLMError::Server { .. } | LLMError::Network(_)
        )
    }
}

/// Language-model completion capability.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete a single prompt. The response is untrusted text.
    async fn complete(&self, prompt: &str) -> Result<String, LLMError>;

    /// Model name, for logging.
    fn model(&self) -> &str;
}

/// Text embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError>;

    /// Dimensionality of every vector this embedder returns.
    fn dim(&self) -> usize;
}

/// Check that a vector has the dimension an embedder promised.
pub fn check_dim(expected: usize, vector: &[f32]) -> Result<(), LLMError> {
    if vector.len() != expected {
        return Err(LLMError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}
