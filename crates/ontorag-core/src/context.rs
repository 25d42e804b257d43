//! Context composition and grounded answering.

use crate::error::Result;
use crate::retrieval::EvidenceBundle;
use ontorag_llm::CompletionService;
use std::sync::Arc;

pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

pub const NO_EVIDENCE_ANSWER: &str =
    "I couldn't find any relevant information in the knowledge graph to answer that question.";

const SECTION_SEPARATOR: &str = "\n\n---\n\n";
const EXPANDED_HEADER: &str = "Expanded facts:";

/// Render a bundle into the context handed to the answer model.
///
/// Whole chunk sections are added in retrieval order while they fit in
/// `max_chars`; expansion facts are then added line by line while they fit.
/// The first section is always present, cut short if it alone exceeds the
/// budget.
pub fn compose(bundle: &EvidenceBundle, max_chars: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;

    for (i, chunk) in bundle.chunks.iter().enumerate() {
        let mut section = format!("Chunk {}:\n{}\nMentions:", i + 1, chunk.text);
        let mentions = bundle.mentions_for(&chunk.chunk_id);
        if mentions.is_empty() {
            section.push_str("\n- (none)");
        } else {
            for m in mentions {
                section.push_str(&format!("\n- {} ({})", m.name, m.label));
            }
        }

        let sep = if out.is_empty() { 0 } else { SECTION_SEPARATOR.len() };
        let len = section.chars().count();
        if used + sep + len > max_chars {
            if out.is_empty() {
                out = section.chars().take(max_chars).collect();
                used = max_chars;
            }
            break;
        }
        if sep > 0 {
            out.push_str(SECTION_SEPARATOR);
        }
        out.push_str(&section);
        used += sep + len;
    }

    if bundle.expansion_triples.is_empty() {
        return out;
    }
    let sep = if out.is_empty() { 0 } else { SECTION_SEPARATOR.len() };
    let header_len = EXPANDED_HEADER.len();
    let mut lines = Vec::new();
    let mut section_len = header_len;
    for fact in &bundle.expansion_triples {
        let line = fact.to_string();
        let line_len = 1 + line.chars().count();
        if used + sep + section_len + line_len > max_chars {
            break;
        }
        section_len += line_len;
        lines.push(line);
    }
    if lines.is_empty() {
        return out;
    }
    if sep > 0 {
        out.push_str(SECTION_SEPARATOR);
    }
    out.push_str(EXPANDED_HEADER);
    for line in lines {
        out.push('\n');
        out.push_str(&line);
    }
    out
}

/// The fixed instruction template for grounded answers.
pub fn answer_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer the following question using only the information in the context.\n\n\
         Question: {question}\n\n\
         Context:\n{context}\n\n\
         Answer:"
    )
}

pub struct Answerer {
    llm: Arc<dyn CompletionService>,
}

impl Answerer {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    /// Ask the model to answer from `context`. The response is returned as-is.
    pub async fn answer(&self, question: &str, context: &str) -> Result<String> {
        let prompt = answer_prompt(question, context);
        tracing::debug!(model = self.llm.model(), context_chars = context.len(), "generating answer");
        Ok(self.llm.complete(&prompt).await?)
    }
}
