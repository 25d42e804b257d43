//! Error taxonomy for the ingestion and query paths.

use ontorag_docs::DocsError;
use ontorag_graphdb::GraphDbError;
use ontorag_llm::LLMError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Completion or embedding call failed after retries.
    #[error("LLM call failed: {0}")]
    Llm(#[from] LLMError),

    #[error("graph store error: {0}")]
    Store(#[from] GraphDbError),

    /// The ontology file could not be written. Always fatal for the
    /// document being ingested.
    #[error("failed to persist ontology to {path}: {source}")]
    OntologyPersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document error: {0}")]
    Docs(#[from] DocsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Transient external failures are reported per chunk or per question
    /// without aborting the batch.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Llm(e) if e.is_transient())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
