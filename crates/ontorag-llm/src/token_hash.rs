//! Deterministic token-hash embeddings.
//!
//! Each token is hashed (FNV-1a 64) into one of `dim` buckets with a sign
//! taken from a high hash bit; the bucket counts are L2-normalized. Texts
//! that share vocabulary end up with high cosine similarity. No network,
//! no model, stable across runs and platforms.

use crate::{Embedder, LLMError};
use async_trait::async_trait;

pub const DEFAULT_TOKEN_HASH_DIM: usize = 256;

const MAX_TOKEN_LEN: usize = 64;
const MIN_TOKEN_LEN: usize = 2;
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "by", "for", "in", "is", "of", "on", "or", "the", "to",
    "was", "what", "which", "who", "with",
];

#[derive(Debug, Clone, Copy)]
pub struct TokenHashEmbedder {
    dim: usize,
}

impl Default for TokenHashEmbedder {
    fn default() -> Self {
        Self {
            dim: DEFAULT_TOKEN_HASH_DIM,
        }
    }
}

impl TokenHashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for token in tokenize(text) {
            let h = fnv1a64(&token);
            let idx = (h % self.dim as u64) as usize;
            let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for TokenHashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        Ok(self.embed_text(text))
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

fn fnv1a64(s: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// Lowercased alphanumeric tokens, split on camelCase boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_was_lower = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_was_lower && !current.is_empty() {
                push_token(&mut tokens, &mut current);
            }
            for lc in c.to_lowercase() {
                if current.chars().count() < MAX_TOKEN_LEN {
                    current.push(lc);
                }
            }
            prev_was_lower = c.is_lowercase();
            continue;
        }
        if !current.is_empty() {
            push_token(&mut tokens, &mut current);
        }
        prev_was_lower = false;
    }
    if !current.is_empty() {
        push_token(&mut tokens, &mut current);
    }
    tokens
}

fn push_token(tokens: &mut Vec<String>, current: &mut String) {
    if current.chars().count() >= MIN_TOKEN_LEN && !STOPWORDS.contains(&current.as_str()) {
        tokens.push(std::mem::take(current));
    } else {
        current.clear();
    }
}
