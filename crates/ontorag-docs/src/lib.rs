//! Document loading and chunking for ontorag
//!
//! Turns source documents into ordered chunks:
//! - PDF documents (text per page, behind the `pdf` feature)
//! - Plain text and markdown files
//!
//! Chunk identifiers are stable: `{doc_id}:{index}`, where `doc_id` is the
//! file stem and `index` counts chunks across the whole document in page
//! order. For a given document and splitter configuration the chunk count and
//! order are deterministic, which is what makes re-ingestion idempotent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub mod pdf;
pub mod splitter;

pub use pdf::{PdfDocument, PdfPage, PdfParser};
pub use splitter::{RecursiveCharacterSplitter, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DocsError {
    #[error("PDF extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF feature not enabled. Compile with --features pdf")]
    FeatureNotEnabled,
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid splitter configuration: {0}")]
    InvalidConfig(String),
}

// ============================================================================
// Source documents and chunks
// ============================================================================

/// One page (or the whole body, for flat text files) of a source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number; `None` for formats without pages.
    pub page: Option<usize>,
    pub text: String,
}

/// A loaded document, ready to be split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub doc_id: String,
    pub source_path: String,
    pub pages: Vec<PageText>,
}

impl SourceDocument {
    /// Build a single-page document from in-memory text.
    pub fn from_text(doc_id: &str, text: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            source_path: String::new(),
            pages: vec![PageText {
                page: None,
                text: text.to_string(),
            }],
        }
    }
}

/// A document chunk with source pointer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    pub index: usize,
    pub page: Option<usize>,
    pub text: String,
    pub metadata: HashMap<String, String>,
}

/// Anything that turns a document into an ordered sequence of chunks.
pub trait Chunker: Send + Sync {
    fn split(&self, document: &SourceDocument) -> Vec<Chunk>;
}

/// Stable chunk identifier.
pub fn chunk_id(doc_id: &str, index: usize) -> String {
    format!("{doc_id}:{index}")
}

/// Document identifier for a path: the file stem.
pub fn doc_id_for_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Loading
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
    Markdown,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// Load a document from disk, dispatching on its extension.
pub fn load_document(path: &Path) -> Result<SourceDocument, DocsError> {
    let format = DocumentFormat::from_path(path)
        .ok_or_else(|| DocsError::UnsupportedFormat(path.display().to_string()))?;
    let doc_id = doc_id_for_path(path);

    let pages = match format {
        DocumentFormat::Pdf => {
            let pdf = PdfParser::new().parse_file(path)?;
            pdf.pages
                .into_iter()
                .map(|p| PageText {
                    page: Some(p.number),
                    text: p.text,
                })
                .collect()
        }
        DocumentFormat::Text | DocumentFormat::Markdown => {
            let text = std::fs::read_to_string(path)?;
            vec![PageText { page: None, text }]
        }
    };

    tracing::debug!(doc_id = %doc_id, pages = pages.len(), "loaded document");

    Ok(SourceDocument {
        doc_id,
        source_path: path.display().to_string(),
        pages,
    })
}

/// List ingestible documents directly inside `dir`, sorted by file name.
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>, DocsError> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => DocsError::Io(io),
            None => DocsError::Io(std::io::Error::other("filesystem loop while listing documents")),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if DocumentFormat::from_path(entry.path()).is_some() {
            out.push(entry.into_path());
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_doc_colon_index() {
        assert_eq!(chunk_id("budget_2024", 7), "budget_2024:7");
    }

    #[test]
    fn doc_id_is_file_stem() {
        assert_eq!(doc_id_for_path(Path::new("data/budget_2024.pdf")), "budget_2024");
    }

    #[test]
    fn discovers_only_supported_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join("ignore.csv"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), "c").unwrap();

        let found = discover_documents(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
    }

    #[test]
    fn loads_text_document_as_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "The Ministry of Finance announced the Act.").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.doc_id, "notes");
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].page, None);
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = load_document(Path::new("table.csv")).unwrap_err();
        assert!(matches!(err, DocsError::UnsupportedFormat(_)));
    }
}
