//! Ingestion and query orchestration.
//!
//! ```text
//! ingest:  document ─► chunks ─► embed + store ─► extract (buffered) ─► propose types ─► write facts ─► flush
//! query:   question ─► retrieve ─► compose ─► answer
//! ```
//!
//! Ontology growth always happens before the facts that need it are written:
//! new types are proposed under the shared ontology lock, and the writer
//! gates against a snapshot taken after the proposal.

use crate::context::{compose, Answerer, DEFAULT_MAX_CONTEXT_CHARS, NO_EVIDENCE_ANSWER};
use crate::error::{Error, Result};
use crate::extractor::TripletExtractor;
use crate::ontology::SharedOntology;
use crate::retrieval::{EvidenceBundle, RetrievalExpander};
use crate::runlog::RunLog;
use crate::store::GraphStore;
use crate::writer::{GraphWriter, WriteSummary};
use futures::StreamExt;
use ontorag_docs::{Chunk, Chunker, SourceDocument};
use ontorag_graphdb::ChunkWrite;
use ontorag_llm::{check_dim, CompletionService, Embedder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Per-document ingestion summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub doc_id: String,
    pub chunks: usize,
    /// Chunks whose embedding or extraction call failed.
    pub chunks_failed: usize,
    pub triplets_written: usize,
    pub triplets_rejected: usize,
    pub new_entity_types: BTreeSet<String>,
    pub new_relation_types: BTreeSet<String>,
}

impl DocumentReport {
    pub fn is_complete(&self) -> bool {
        self.chunks_failed == 0
    }
}

/// Outcome of a directory run.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub reports: Vec<DocumentReport>,
    /// File names already in the run log.
    pub skipped: Vec<String>,
    /// File name and error for documents that could not be ingested.
    pub failed: Vec<(String, String)>,
}

impl IngestSummary {
    /// Fold the outcome of [`IngestionPipeline::ingest_file`] into the summary.
    pub fn record(&mut self, path: &Path, result: Result<Option<DocumentReport>>) {
        let file_name = file_name(path);
        match result {
            Ok(Some(report)) => self.reports.push(report),
            Ok(None) => self.skipped.push(file_name),
            Err(e) => {
                tracing::error!(file = %file_name, error = %e, "document failed");
                self.failed.push((file_name, e.to_string()));
            }
        }
    }

    pub fn merge(&mut self, other: IngestSummary) {
        self.reports.extend(other.reports);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}

pub struct IngestionPipeline {
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn CompletionService>,
    store: Arc<dyn GraphStore>,
    ontology: SharedOntology,
    writer: GraphWriter,
    extract_concurrency: usize,
}

impl IngestionPipeline {
    pub fn new(
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn CompletionService>,
        store: Arc<dyn GraphStore>,
        ontology: SharedOntology,
    ) -> Self {
        Self {
            chunker,
            embedder,
            llm,
            writer: GraphWriter::new(store.clone()),
            store,
            ontology,
            extract_concurrency: 1,
        }
    }

    pub fn with_extract_concurrency(mut self, n: usize) -> Self {
        self.extract_concurrency = n.max(1);
        self
    }

    pub fn ontology(&self) -> &SharedOntology {
        &self.ontology
    }

    /// Ingest one document.
    ///
    /// A failed embedding or completion call fails only its chunk. Ontology
    /// persistence and store failures fail the document.
    pub async fn ingest_document(&self, document: &SourceDocument) -> Result<DocumentReport> {
        let chunks = self.chunker.split(document);
        let mut report = DocumentReport {
            doc_id: document.doc_id.clone(),
            chunks: chunks.len(),
            ..Default::default()
        };
        tracing::info!(doc_id = %document.doc_id, chunks = chunks.len(), "ingesting document");

        let mut stored: Vec<&Chunk> = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            match self.store_chunk(chunk).await {
                Ok(()) => stored.push(chunk),
                Err(e @ Error::Llm(_)) => {
                    tracing::warn!(chunk_id = %chunk.chunk_id, error = %e, "embedding failed, skipping chunk");
                    report.chunks_failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let extractor = TripletExtractor::new(self.llm.clone(), self.ontology.lock().snapshot());
        let mut results = futures::stream::iter(stored)
            .map(|chunk| {
                let extractor = &extractor;
                async move { (chunk, extractor.extract(&chunk.text).await) }
            })
            .buffered(self.extract_concurrency);

        let mut written = WriteSummary::default();
        while let Some((chunk, result)) = results.next().await {
            let extraction = match result {
                Ok(x) => x,
                Err(e) => {
                    tracing::warn!(chunk_id = %chunk.chunk_id, error = %e, "extraction failed, skipping chunk");
                    report.chunks_failed += 1;
                    continue;
                }
            };

            let vocabulary = {
                let mut ontology = self.ontology.lock();
                ontology.propose(&extraction.new_entity_types, &extraction.new_relation_types)?;
                ontology.snapshot()
            };
            report.new_entity_types.extend(extraction.new_entity_types);
            report.new_relation_types.extend(extraction.new_relation_types);

            written += self
                .writer
                .write(&extraction.triplets, &chunk.chunk_id, &vocabulary)
                .await?;
        }
        drop(results);

        report.triplets_written = written.written;
        report.triplets_rejected = written.rejected;
        self.store.flush().await?;

        tracing::info!(
            doc_id = %report.doc_id,
            chunks = report.chunks,
            failed = report.chunks_failed,
            written = report.triplets_written,
            rejected = report.triplets_rejected,
            new_entity_types = report.new_entity_types.len(),
            new_relation_types = report.new_relation_types.len(),
            "document ingested"
        );
        Ok(report)
    }

    async fn store_chunk(&self, chunk: &Chunk) -> Result<()> {
        let embedding = self.embedder.embed(&chunk.text).await?;
        check_dim(self.embedder.dim(), &embedding)?;
        let write = self
            .store
            .store_chunk(&chunk.document_id, &chunk.chunk_id, &chunk.text, &embedding)
            .await?;
        if write == ChunkWrite::Existing {
            tracing::debug!(chunk_id = %chunk.chunk_id, "chunk already stored");
        }
        Ok(())
    }

    /// Ingest one file unless `runlog` already has it. `None` means skipped.
    ///
    /// The file is recorded in the run log only when every chunk succeeded;
    /// anything else is retried on the next run. A run log that cannot be
    /// written fails the file, not the run.
    pub async fn ingest_file(
        &self,
        path: &Path,
        runlog: &mut RunLog,
    ) -> Result<Option<DocumentReport>> {
        let file_name = file_name(path);
        if runlog.contains(&file_name) {
            tracing::debug!(file = %file_name, "already processed");
            return Ok(None);
        }

        let document = ontorag_docs::load_document(path)?;
        let report = self.ingest_document(&document).await?;
        if report.is_complete() {
            runlog.mark_done(&file_name)?;
        } else {
            tracing::warn!(
                file = %file_name,
                failed = report.chunks_failed,
                "document incomplete, will retry on next run"
            );
        }
        Ok(Some(report))
    }

    /// Ingest every supported document in `dir` not yet in `runlog`.
    pub async fn ingest_dir(&self, dir: &Path, runlog: &mut RunLog) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();
        for path in ontorag_docs::discover_documents(dir)? {
            let result = self.ingest_file(&path, runlog).await;
            summary.record(&path, result);
        }
        Ok(summary)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub question: String,
    pub answer: String,
    /// Empty when nothing was retrieved.
    pub context: String,
    pub evidence: EvidenceBundle,
}

pub struct QueryEngine {
    expander: RetrievalExpander,
    answerer: Answerer,
    max_context_chars: usize,
}

impl QueryEngine {
    pub fn new(expander: RetrievalExpander, answerer: Answerer) -> Self {
        Self {
            expander,
            answerer,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }

    pub fn with_max_context_chars(mut self, max_chars: usize) -> Self {
        self.max_context_chars = max_chars.max(1);
        self
    }

    /// Retrieve, compose and answer. With no evidence the stock answer is
    /// returned without calling the model.
    pub async fn ask(&self, question: &str) -> Result<QueryAnswer> {
        let evidence = self.expander.retrieve(question).await?;
        if evidence.is_empty() {
            return Ok(QueryAnswer {
                question: question.to_string(),
                answer: NO_EVIDENCE_ANSWER.to_string(),
                context: String::new(),
                evidence,
            });
        }
        let context = compose(&evidence, self.max_context_chars);
        let answer = self.answerer.answer(question, &context).await?;
        Ok(QueryAnswer {
            question: question.to_string(),
            answer,
            context,
            evidence,
        })
    }
}
