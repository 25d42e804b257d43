//! Ontology-guided triplet extraction.
//!
//! The model sees the current vocabulary and is asked for a list of
//! five-field triplets. Types outside the vocabulary are marked
//! `NEW_ENTITY_TYPE:<name>` / `NEW_RELATION_TYPE:<name>`; the extractor
//! unwraps them and reports them so the ontology can grow before anything
//! is written. Model output is untrusted: it is cleaned, parsed with the
//! literal-only parser, and every malformed element is dropped.

use crate::error::Result;
use crate::ontology::{normalize_type, Ontology};
use crate::parser::{clean_raw, parse_list_literal, Literal};
use crate::triplet::{clean_field, Triplet};
use ontorag_graphdb::{RelType, SafeLabel};
use ontorag_llm::CompletionService;
use std::collections::BTreeSet;
use std::sync::Arc;

pub const NEW_ENTITY_MARKER: &str = "NEW_ENTITY_TYPE:";
pub const NEW_RELATION_MARKER: &str = "NEW_RELATION_TYPE:";

/// Per-call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionOutcome {
    /// Top-level elements in the parsed output.
    pub raw_elements: usize,
    pub kept: usize,
    pub discarded: usize,
    /// The output could not be parsed at all.
    pub parse_failed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub triplets: Vec<Triplet>,
    /// Normalized entity types not in the vocabulary.
    pub new_entity_types: BTreeSet<String>,
    /// Normalized relation types not in the vocabulary.
    pub new_relation_types: BTreeSet<String>,
    pub outcome: ExtractionOutcome,
}

pub struct TripletExtractor {
    llm: Arc<dyn CompletionService>,
    vocabulary: Ontology,
}

impl TripletExtractor {
    /// `vocabulary` is the ontology snapshot used for every prompt this
    /// extractor builds.
    pub fn new(llm: Arc<dyn CompletionService>, vocabulary: Ontology) -> Self {
        Self { llm, vocabulary }
    }

    pub fn vocabulary(&self) -> &Ontology {
        &self.vocabulary
    }

    pub fn build_prompt(&self, chunk_text: &str) -> String {
        let entity_types = join(&self.vocabulary.entity_types);
        let relation_types = join(&self.vocabulary.relation_types);
        format!(
            r#"You are an expert in extracting structured information from government documents.

Given a text delimited by triple backticks:
- Identify factual relationships between entities in the text
- Output a list of triplets in the format:
  [ENTITY 1, TYPE of ENTITY 1, RELATION, ENTITY 2, TYPE of ENTITY 2]
- Prefer the allowed types below. If no allowed type fits, write
  {NEW_ENTITY_MARKER}<type> for an entity type or {NEW_RELATION_MARKER}<relation>
  for a relation type.
- Output only the list, no commentary.

### Allowed Entity Types:
- {entity_types}

### Allowed Relation Types:
- {relation_types}

### Example:
text: "The Ministry of Finance, headed by Nirmala Sitharaman, announced the Fiscal Responsibility Act on 1 Feb 2024. The National Mission for Clean Ganga was launched by the Ministry of Jal Shakti."

output:
[
["Ministry of Finance", "ministry", "has minister", "Nirmala Sitharaman", "person"],
["Ministry of Finance", "ministry", "announced", "Fiscal Responsibility Act", "policy"],
["Fiscal Responsibility Act", "policy", "effective from", "1 Feb 2024", "date"],
["Ministry of Jal Shakti", "ministry", "{NEW_RELATION_MARKER}launched", "National Mission for Clean Ganga", "{NEW_ENTITY_MARKER}mission"]
]

Now process this:
```{chunk_text}```
output:
"#
        )
    }

    /// Extract triplets from one chunk. Only a failed completion call is an
    /// error; unusable output yields an empty extraction.
    pub async fn extract(&self, chunk_text: &str) -> Result<Extraction> {
        let prompt = self.build_prompt(chunk_text);
        let raw = self.llm.complete(&prompt).await?;
        tracing::debug!(model = self.llm.model(), raw = %raw, "raw triplet output");
        Ok(self.parse_response(&raw))
    }

    /// Turn raw model output into validated triplets and new types.
    pub fn parse_response(&self, raw: &str) -> Extraction {
        let mut extraction = Extraction::default();
        let cleaned = clean_raw(raw);
        let items = match parse_list_literal(&cleaned) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse structured triplets");
                extraction.outcome.parse_failed = true;
                return extraction;
            }
        };

        extraction.outcome.raw_elements = items.len();
        for item in &items {
            match self.triplet_from(item, &mut extraction) {
                Some(t) => extraction.triplets.push(t),
                None => extraction.outcome.discarded += 1,
            }
        }
        extraction.outcome.kept = extraction.triplets.len();
        if extraction.outcome.discarded > 0 {
            tracing::warn!(
                discarded = extraction.outcome.discarded,
                kept = extraction.outcome.kept,
                "discarded malformed triplets"
            );
        }
        extraction
    }

    fn triplet_from(&self, item: &Literal, extraction: &mut Extraction) -> Option<Triplet> {
        let Literal::List(fields) = item else {
            return None;
        };
        let [s, st, p, o, ot] = fields.as_slice() else {
            return None;
        };
        let subject = clean_field(s.as_str()?);
        let object = clean_field(o.as_str()?);
        let subject_type = unwrap_type(clean_field(st.as_str()?), NEW_ENTITY_MARKER);
        let relation = unwrap_type(clean_field(p.as_str()?), NEW_RELATION_MARKER);
        let object_type = unwrap_type(clean_field(ot.as_str()?), NEW_ENTITY_MARKER);

        if [subject, subject_type, relation, object, object_type]
            .iter()
            .any(|f| f.is_empty())
        {
            return None;
        }

        // Types the graph can never hold must not reach the ontology.
        let unusable = [subject_type, object_type]
            .into_iter()
            .map(|t| SafeLabel::normalize(t).err())
            .chain(std::iter::once(RelType::normalize(relation).err()))
            .flatten()
            .next();
        if let Some(reason) = unusable {
            tracing::debug!(%reason, "discarding triplet with unusable type");
            return None;
        }

        // Marked or not, a type is new only if the vocabulary lacks it.
        for t in [subject_type, object_type] {
            if !self.vocabulary.contains_entity_type(t) {
                extraction.new_entity_types.insert(normalize_type(t));
            }
        }
        if !self.vocabulary.contains_relation_type(relation) {
            extraction.new_relation_types.insert(normalize_type(relation));
        }

        Some(Triplet::new(subject, subject_type, relation, object, object_type))
    }
}

/// Strip a `NEW_*_TYPE:` marker (case-insensitive).
fn unwrap_type<'a>(field: &'a str, marker: &str) -> &'a str {
    match field.get(..marker.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(marker) => clean_field(&field[marker.len()..]),
        _ => field,
    }
}

fn join(types: &BTreeSet<String>) -> String {
    types.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
}
