//! Recursive character splitter.
//!
//! Splits text on the coarsest separator present (`"\n\n"`, then `"\n"`, then
//! `" "`, then individual characters), recursing into pieces that are still
//! too long, and then greedily merges pieces back into chunks of at most
//! `chunk_size` characters with up to `chunk_overlap` characters carried over
//! between neighbouring chunks. Lengths are measured in `char`s.

use crate::{chunk_id, Chunk, Chunker, DocsError, SourceDocument};
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveCharacterSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RecursiveCharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, DocsError> {
        if chunk_size == 0 {
            return Err(DocsError::InvalidConfig("chunk_size must be > 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(DocsError::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split raw text into trimmed, non-empty pieces.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(|s| s.as_str()).collect();
        self.split_recursive(text, &separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (sep_idx, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len().saturating_sub(1), ""));
        let finer = separators.get(sep_idx + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge_pieces(&fitting, separator));
                fitting.clear();
            }
            if finer.is_empty() {
                out.push(piece.to_string());
            } else {
                out.extend(self.split_recursive(piece, finer));
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge_pieces(&fitting, separator));
        }
        out
    }

    fn merge_pieces(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_joined(&mut docs, &current, separator);
                // Drop from the front until we are within the overlap budget
                // and the next piece fits.
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    let dropped_joiner = if current.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(char_len(first) + dropped_joiner);
                }
            }
            let joiner = if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
            total += len + joiner;
        }
        push_joined(&mut docs, &current, separator);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, current: &VecDeque<&str>, separator: &str) {
    if current.is_empty() {
        return;
    }
    let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl Chunker for RecursiveCharacterSplitter {
    fn split(&self, document: &SourceDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in &document.pages {
            for text in self.split_text(&page.text) {
                let index = chunks.len();
                let mut metadata = HashMap::new();
                metadata.insert("source".to_string(), document.source_path.clone());
                if let Some(p) = page.page {
                    metadata.insert("page".to_string(), p.to_string());
                }
                chunks.push(Chunk {
                    chunk_id: chunk_id(&document.doc_id, index),
                    document_id: document.doc_id.clone(),
                    index,
                    page: page.page,
                    text,
                    metadata,
                });
            }
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = RecursiveCharacterSplitter::default();
        let chunks = splitter.split_text("  The Ministry of Finance announced the Act.  ");
        assert_eq!(chunks, vec!["The Ministry of Finance announced the Act."]);
    }

    #[test]
    fn paragraphs_are_preferred_split_points() {
        let splitter = RecursiveCharacterSplitter::new(30, 0).unwrap();
        let text = "first paragraph here\n\nsecond paragraph here";
        let chunks = splitter.split_text(text);
        assert_eq!(chunks, vec!["first paragraph here", "second paragraph here"]);
    }

    #[test]
    fn neighbouring_chunks_overlap() {
        let splitter = RecursiveCharacterSplitter::new(20, 8).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = splitter.split_text(text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(
                pair[1].contains(last_word),
                "expected overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn long_words_fall_back_to_characters() {
        let splitter = RecursiveCharacterSplitter::new(4, 0).unwrap();
        let chunks = splitter.split_text("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(RecursiveCharacterSplitter::new(10, 10).is_err());
        assert!(RecursiveCharacterSplitter::new(0, 0).is_err());
    }

    #[test]
    fn chunker_numbers_chunks_across_pages() {
        let doc = SourceDocument {
            doc_id: "budget".to_string(),
            source_path: "data/budget.pdf".to_string(),
            pages: vec![
                crate::PageText {
                    page: Some(1),
                    text: "page one text".to_string(),
                },
                crate::PageText {
                    page: Some(2),
                    text: "page two text".to_string(),
                },
            ],
        };
        let chunks = RecursiveCharacterSplitter::default().split(&doc);
        let ids: Vec<_> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["budget:0", "budget:1"]);
        assert_eq!(chunks[1].page, Some(2));
        assert_eq!(chunks[1].metadata.get("page").map(|s| s.as_str()), Some("2"));
    }

    #[test]
    fn splitting_is_deterministic() {
        let splitter = RecursiveCharacterSplitter::new(50, 10).unwrap();
        let doc = SourceDocument::from_text("d", &"word ".repeat(200));
        assert_eq!(splitter.split(&doc), splitter.split(&doc));
    }

    proptest! {
        #[test]
        fn chunks_never_exceed_size(text in "[a-z \\n]{0,400}") {
            let splitter = RecursiveCharacterSplitter::new(40, 10).unwrap();
            for chunk in splitter.split_text(&text) {
                prop_assert!(chunk.chars().count() <= 40, "chunk too long: {chunk:?}");
                prop_assert!(!chunk.trim().is_empty());
            }
        }
    }
}
