//! OpenAI-compatible HTTP provider.
//!
//! Works against api.openai.com and any server exposing the same
//! `/chat/completions` and `/embeddings` endpoints (vLLM, Ollama, ...).

use crate::{check_dim, CompletionService, Embedder, LLMConfig, LLMError, RetryPolicy};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

pub struct OpenAIClient {
    client: Client,
    config: LLMConfig,
    retry: RetryPolicy,
}

impl OpenAIClient {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LLMError::Network(format!("failed to create HTTP client: {e}")))?;
        let retry = RetryPolicy::new(config.max_retries);
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    pub fn config(&self) -> &LLMConfig {
        &self.config
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value, LLMError> {
        let url = format!("{}/{}", self.config.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| LLMError::InvalidResponse(e.to_string()))
    }

    async fn chat_once(&self, prompt: &str) -> Result<String, LLMError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.config.extraction_temperature,
        });
        let data = self.post("chat/completions", &body).await?;
        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LLMError::InvalidResponse("missing choices[0].message.content".into()))
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        let body = serde_json::json!({
            "model": self.config.embed_model,
            "input": [text],
        });
        let data = self.post("embeddings", &body).await?;
        let values = data["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| LLMError::InvalidResponse("missing data[0].embedding".into()))?;
        let vector: Vec<f32> = values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<_>>()
            .ok_or_else(|| LLMError::InvalidResponse("non-numeric embedding value".into()))?;
        check_dim(self.config.embed_dim, &vector)?;
        Ok(vector)
    }
}

async fn check_status(response: Response) -> Result<Response, LLMError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(LLMError::RateLimited {
            retry_after_ms: retry_after * 1000,
        });
    }
    if status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(LLMError::Server {
            status: status.as_u16(),
            body,
        });
    }
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(LLMError::Api(format!("{status}: {error_text}")));
    }
    Ok(response)
}

#[async_trait]
impl CompletionService for OpenAIClient {
    async fn complete(&self, prompt: &str) -> Result<String, LLMError> {
        tracing::debug!(model = %self.config.model, prompt_chars = prompt.len(), "chat completion");
        self.retry.run("chat/completions", || self.chat_once(prompt)).await
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl Embedder for OpenAIClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        self.retry.run("embeddings", || self.embed_once(text)).await
    }

    fn dim(&self) -> usize {
        self.config.embed_dim
    }
}
