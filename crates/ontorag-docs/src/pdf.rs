//! PDF text extraction
//!
//! Extracts page text from PDF documents for chunking.

use crate::DocsError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extracted PDF content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfDocument {
    pub title: Option<String>,
    pub pages: Vec<PdfPage>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfPage {
    pub number: usize,
    pub text: String,
}

/// PDF parser using pdf-extract
#[derive(Debug, Default, Clone)]
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse PDF from file path
    #[cfg(feature = "pdf")]
    pub fn parse_file(&self, path: &Path) -> Result<PdfDocument, DocsError> {
        let bytes = std::fs::read(path)?;
        let mut doc = self.parse_bytes(&bytes)?;
        doc.title = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string());
        Ok(doc)
    }

    /// Parse PDF from bytes
    #[cfg(feature = "pdf")]
    pub fn parse_bytes(&self, data: &[u8]) -> Result<PdfDocument, DocsError> {
        let text = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| DocsError::ExtractionFailed(e.to_string()))?;
        let pages = split_into_pages(&text);
        Ok(PdfDocument {
            title: None,
            pages,
            text,
        })
    }

    /// Fallback when pdf feature not enabled
    #[cfg(not(feature = "pdf"))]
    pub fn parse_file(&self, _path: &Path) -> Result<PdfDocument, DocsError> {
        Err(DocsError::FeatureNotEnabled)
    }

    #[cfg(not(feature = "pdf"))]
    pub fn parse_bytes(&self, _data: &[u8]) -> Result<PdfDocument, DocsError> {
        Err(DocsError::FeatureNotEnabled)
    }
}

/// Split extracted text into pages on form feeds.
///
/// Blank pages are dropped but still consume a page number, so page numbers
/// line up with the PDF.
pub(crate) fn split_into_pages(text: &str) -> Vec<PdfPage> {
    text.split('\x0C')
        .enumerate()
        .filter(|(_, body)| !body.trim().is_empty())
        .map(|(i, body)| PdfPage {
            number: i + 1,
            text: body.to_string(),
        })
        .collect()
}
