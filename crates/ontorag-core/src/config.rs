//! Process-wide settings.
//!
//! Defaults, then an optional JSON file, then `ONTORAG_*` environment
//! variables. LLM credentials are read separately by
//! [`ontorag_llm::LLMConfig::from_env`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedderKind {
    /// OpenAI-compatible `/embeddings` endpoint.
    Openai,
    /// Offline deterministic token hashing.
    TokenHash,
}

impl FromStr for EmbedderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::Openai),
            "token-hash" | "token_hash" | "tokenhash" => Ok(Self::TokenHash),
            other => Err(Error::Config(format!(
                "unknown embedder {other:?} (expected openai or token-hash)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for source documents.
    pub data_dir: PathBuf,
    /// Directory holding the graph snapshot, ontology and run log.
    pub state_dir: PathBuf,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_context_chars: usize,
    pub max_expansion_facts: usize,
    /// Chunks extracted in parallel per document; 1 is sequential.
    pub extract_concurrency: usize,
    pub embedder: EmbedderKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            state_dir: PathBuf::from(".ontorag"),
            top_k: 10,
            chunk_size: ontorag_docs::DEFAULT_CHUNK_SIZE,
            chunk_overlap: ontorag_docs::DEFAULT_CHUNK_OVERLAP,
            max_context_chars: 12_000,
            max_expansion_facts: 100,
            extract_concurrency: 1,
            embedder: EmbedderKind::Openai,
        }
    }
}

impl Config {
    /// Load from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)?;
                serde_json::from_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|k| std::env::var(k).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("ONTORAG_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("ONTORAG_STATE_DIR") {
            self.state_dir = PathBuf::from(dir);
        }
        if let Some(k) = lookup("ONTORAG_TOP_K") {
            self.top_k = k
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("ONTORAG_TOP_K={k} is not a number")))?;
        }
        if let Some(kind) = lookup("ONTORAG_EMBEDDER") {
            self.embedder = kind.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::Config("top_k must be at least 1".to_string()));
        }
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.max_context_chars == 0 {
            return Err(Error::Config(
                "max_context_chars must be at least 1".to_string(),
            ));
        }
        if self.extract_concurrency == 0 {
            return Err(Error::Config(
                "extract_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn graph_path(&self) -> PathBuf {
        self.state_dir.join("graph.orgd")
    }

    pub fn ontology_path(&self) -> PathBuf {
        self.state_dir.join("ontology.json")
    }

    pub fn runlog_path(&self) -> PathBuf {
        self.state_dir.join("processed.json")
    }
}
