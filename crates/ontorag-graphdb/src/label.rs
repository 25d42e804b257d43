//! Node labels and edge types.
//!
//! Type names come from model output, so they never reach the store as-is:
//! every label goes through one normalization function and an allow-list
//! check. Only [`SafeLabel`] and [`RelType`] values are accepted by the
//! graph API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Label of chunk nodes.
pub const CHUNK_LABEL: &str = "Chunk";
/// Label of document nodes.
pub const DOCUMENT_LABEL: &str = "Document";
/// Edge from a chunk to an entity it mentions.
pub const MENTIONS: &str = "MENTIONS";
/// Edge from a document to one of its chunks.
pub const HAS_CHUNK: &str = "HAS_CHUNK";

const RESERVED_LABELS: &[&str] = &[CHUNK_LABEL, DOCUMENT_LABEL];
const RESERVED_REL_TYPES: &[&str] = &[MENTIONS, HAS_CHUNK];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    #[error("type {0:?} normalizes to an empty label")]
    Empty(String),
    #[error("label {0:?} is not allowed")]
    NotAllowed(String),
    #[error("label {0:?} is reserved")]
    Reserved(String),
}

/// Runs of letters (with their combining marks) and digits.
fn word_pattern() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"[\p{L}\p{M}\p{N}]+").expect("static regex"))
}

fn label_pattern() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^\p{L}[\p{L}\p{M}\p{N}_]*$").expect("static regex"))
}

/// Like labels, but without lowercase letters.
fn rel_pattern() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^[\p{L}--\p{Ll}][\p{L}\p{M}\p{N}_--\p{Ll}]*$").expect("static regex")
    })
}

/// A node label that is safe to use as a label filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SafeLabel(String);

impl SafeLabel {
    /// Normalize an entity type name into a label: title-case each word and
    /// drop whitespace, hyphens and other non-word characters. Letters
    /// outside ASCII are kept.
    ///
    /// `"budget item"`, `"Budget Item"` and `"budget-item"` all give
    /// `BudgetItem`.
    pub fn normalize(type_name: &str) -> Result<Self, LabelError> {
        let mut out = String::new();
        for word in word_pattern().find_iter(type_name) {
            let mut chars = word.as_str().chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.extend(chars.flat_map(char::to_lowercase));
            }
        }
        if out.is_empty() {
            return Err(LabelError::Empty(type_name.to_string()));
        }
        Self::parse(&out)
    }

    /// Accept an already-normalized label after the allow-list check.
    pub fn parse(label: &str) -> Result<Self, LabelError> {
        if !label_pattern().is_match(label) {
            return Err(LabelError::NotAllowed(label.to_string()));
        }
        if RESERVED_LABELS.contains(&label) {
            return Err(LabelError::Reserved(label.to_string()));
        }
        Ok(Self(label.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SafeLabel {
    type Error = LabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SafeLabel> for String {
    fn from(label: SafeLabel) -> Self {
        label.0
    }
}

impl fmt::Display for SafeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An upper-snake-case edge type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelType(String);

impl RelType {
    /// Normalize a relation name: uppercase, runs of spaces, hyphens and
    /// other non-word characters become a single `_`.
    ///
    /// `"has minister"`, `"has-minister"` and `"has_minister"` all give
    /// `HAS_MINISTER`.
    pub fn normalize(relation: &str) -> Result<Self, LabelError> {
        let out = word_pattern()
            .find_iter(relation)
            .map(|w| w.as_str().to_uppercase())
            .collect::<Vec<_>>()
            .join("_");
        if out.is_empty() {
            return Err(LabelError::Empty(relation.to_string()));
        }
        Self::parse(&out)
    }

    pub fn parse(rel_type: &str) -> Result<Self, LabelError> {
        if !rel_pattern().is_match(rel_type) {
            return Err(LabelError::NotAllowed(rel_type.to_string()));
        }
        if RESERVED_REL_TYPES.contains(&rel_type) {
            return Err(LabelError::Reserved(rel_type.to_string()));
        }
        Ok(Self(rel_type.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RelType {
    type Error = LabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RelType> for String {
    fn from(rel: RelType) -> Self {
        rel.0
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
