//! LLM configuration loaded from environment or code.

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EXTRACTION_MODEL: &str = "gpt-4o";
pub const DEFAULT_ANSWER_MODEL: &str = "gpt-4.1-nano";
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";
/// Output dimension of `text-embedding-3-small`.
pub const DEFAULT_EMBED_DIM: usize = 1536;

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: String,
    pub base_url: String,
    /// Model used for triplet extraction.
    pub model: String,
    /// Model used for answer generation.
    pub answer_model: String,
    pub embed_model: String,
    pub embed_dim: usize,
    pub extraction_temperature: f32,
    pub answer_temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No LLM provider configured. Set OPENAI_API_KEY (and optionally OPENAI_BASE_URL)")]
    NoProviderConfigured,
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl LLMConfig {
    /// Create OpenAI config
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
            answer_model: DEFAULT_ANSWER_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            embed_dim: DEFAULT_EMBED_DIM,
            extraction_temperature: 0.2,
            answer_temperature: 0.0,
            timeout_secs: 60,
            max_retries: 3,
        }
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup (environment, map, ...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::NoProviderConfigured)?;

        let mut config = Self::openai(
            &api_key,
            &lookup("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_EXTRACTION_MODEL.to_string()),
        );
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("OPENAI_ANSWER_MODEL") {
            config.answer_model = model;
        }
        if let Some(model) = lookup("OPENAI_EMBED_MODEL") {
            config.embed_model = model;
        }
        if let Some(dim) = lookup("OPENAI_EMBED_DIM") {
            config.embed_dim = dim
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("OPENAI_EMBED_DIM={dim}")))?;
        }
        if let Some(secs) = lookup("OPENAI_TIMEOUT_SECS") {
            config.timeout_secs = secs
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("OPENAI_TIMEOUT_SECS={secs}")))?;
        }
        if let Some(n) = lookup("OPENAI_MAX_RETRIES") {
            config.max_retries = n
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("OPENAI_MAX_RETRIES={n}")))?;
        }
        Ok(config)
    }

    /// Same settings, answering with the answer model instead of the
    /// extraction model.
    pub fn for_answers(&self) -> Self {
        let mut config = self.clone();
        config.model = self.answer_model.clone();
        config.extraction_temperature = self.answer_temperature;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_config_creation() {
        let config = LLMConfig::openai("test-key", "gpt-4o");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn missing_key_is_reported() {
        let err = LLMConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::NoProviderConfigured));
    }

    #[test]
    fn overrides_from_lookup() {
        let config = LLMConfig::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "k"),
            ("OPENAI_BASE_URL", "http://localhost:11434/v1/"),
            ("OPENAI_MODEL", "llama3"),
            ("OPENAI_EMBED_DIM", "768"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.embed_dim, 768);
        assert_eq!(config.for_answers().model, DEFAULT_ANSWER_MODEL);
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = LLMConfig::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "k"),
            ("OPENAI_MAX_RETRIES", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
