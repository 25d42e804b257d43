//! Retrieval expander: vector hits → mentions → one-hop facts.
//!
//! ```text
//! question ──embed──► top-K chunks ──► mentioned entities ──► outgoing facts
//!                         │                  (per chunk)       (per distinct
//!                         │                                      entity)
//!                         └──── empty? ──► no-evidence bundle, stop
//! ```

use crate::error::Result;
use crate::store::GraphStore;
use ontorag_graphdb::{EntityRef, SafeLabel};
use ontorag_llm::{check_dim, Embedder};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_MAX_EXPANSION_FACTS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub text: String,
    pub score: f32,
}

/// One-hop fact reached from a mentioned entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionFact {
    pub name: String,
    pub entity_type: String,
    pub relation: String,
    pub neighbor: String,
    pub neighbor_type: String,
}

impl fmt::Display for ExpansionFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) --[{}]--> {} ({})",
            self.name, self.entity_type, self.relation, self.neighbor, self.neighbor_type
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Retrieved chunks, most similar first.
    pub chunks: Vec<RetrievedChunk>,
    /// Entities mentioned by each retrieved chunk, keyed by chunk id.
    pub chunk_to_mentions: HashMap<String, Vec<EntityRef>>,
    /// Deduplicated one-hop facts, first-seen order.
    pub expansion_triples: Vec<ExpansionFact>,
}

impl EvidenceBundle {
    /// No chunks were retrieved; there is nothing to answer from.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn mentions_for(&self, chunk_id: &str) -> &[EntityRef] {
        self.chunk_to_mentions
            .get(chunk_id)
            .map(|m| m.as_slice())
            .unwrap_or_default()
    }
}

/// Deduplicate facts by their rendered form, keeping first-seen order, and
/// keep at most `cap`.
pub fn expand_facts<I>(facts: I, cap: usize) -> Vec<ExpansionFact>
where
    I: IntoIterator<Item = ExpansionFact>,
{
    let mut seen = HashSet::new();
    facts
        .into_iter()
        .filter(|f| seen.insert(f.to_string()))
        .take(cap)
        .collect()
}

pub struct RetrievalExpander {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn GraphStore>,
    top_k: usize,
    max_expansion_facts: usize,
}

impl RetrievalExpander {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn GraphStore>) -> Self {
        Self {
            embedder,
            store,
            top_k: DEFAULT_TOP_K,
            max_expansion_facts: DEFAULT_MAX_EXPANSION_FACTS,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_max_expansion_facts(mut self, cap: usize) -> Self {
        self.max_expansion_facts = cap;
        self
    }

    pub async fn retrieve(&self, question: &str) -> Result<EvidenceBundle> {
        let embedding = self.embedder.embed(question).await?;
        check_dim(self.embedder.dim(), &embedding)?;

        let hits = self.store.nearest_chunks(&embedding, self.top_k).await?;
        if hits.is_empty() {
            tracing::info!("no chunks retrieved");
            return Ok(EvidenceBundle::default());
        }
        let chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .map(|h| RetrievedChunk {
                chunk_id: h.chunk_id,
                doc_id: h.doc_id,
                text: h.text,
                score: h.score,
            })
            .collect();

        let mut chunk_to_mentions = HashMap::new();
        let mut entities: Vec<EntityRef> = Vec::new();
        let mut seen_entities = HashSet::new();
        for chunk in &chunks {
            let mentions = self.store.chunk_mentions(&chunk.chunk_id).await?;
            for m in &mentions {
                if seen_entities.insert(m.clone()) {
                    entities.push(m.clone());
                }
            }
            chunk_to_mentions.insert(chunk.chunk_id.clone(), mentions);
        }

        let mut raw = Vec::new();
        for entity in &entities {
            let label = match SafeLabel::parse(&entity.label) {
                Ok(l) => l,
                Err(e) => {
                    tracing::warn!(label = %entity.label, error = %e, "skipping entity with unusable label");
                    continue;
                }
            };
            for fact in self.store.outgoing_facts(&label, &entity.name).await? {
                if fact.rel_type.is_empty() || fact.object.name.is_empty() {
                    continue;
                }
                raw.push(ExpansionFact {
                    name: fact.subject.name,
                    entity_type: fact.subject.label,
                    relation: fact.rel_type,
                    neighbor: fact.object.name,
                    neighbor_type: fact.object.label,
                });
            }
        }
        let expansion_triples = expand_facts(raw, self.max_expansion_facts);

        tracing::info!(
            chunks = chunks.len(),
            entities = entities.len(),
            facts = expansion_triples.len(),
            "retrieved evidence"
        );
        Ok(EvidenceBundle {
            chunks,
            chunk_to_mentions,
            expansion_triples,
        })
    }
}
