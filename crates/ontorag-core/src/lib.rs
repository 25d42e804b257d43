//! ontorag core: ontology-guided triplet extraction and graph-expansion retrieval
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              INGESTION                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────┐    ┌──────────┐    ┌───────────┐    ┌──────────────────┐   │
//! │  │ Chunker │───►│ Embedder │───►│ Extractor │───►│ Ontology Store   │   │
//! │  └─────────┘    └────┬─────┘    └─────┬─────┘    │ propose, persist │   │
//! │                      │                │          └────────┬─────────┘   │
//! │                      │ chunks         │ triplets          │ snapshot    │
//! │                      ▼                ▼                   ▼             │
//! │                 ┌────────────────────────────────────────────────┐      │
//! │                 │ GraphStore   (Graph Writer gates on ontology)   │      │
//! │                 └────────────────────────────────────────────────┘      │
//! │                                       ▲                                 │
//! ├───────────────────────────────────────┼─────────────────────────────────┤
//! │                              QUERY    │                                 │
//! ├───────────────────────────────────────┼─────────────────────────────────┤
//! │                                       │                                 │
//! │  question ──► Embedder ──► top-K chunks ──► mentions ──► one-hop facts  │
//! │                                                              │          │
//! │                         answer ◄── Answerer ◄── compose ◄────┘          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every collaborator is injected as an `Arc<dyn Trait>`: [`ontorag_docs::Chunker`],
//! [`ontorag_llm::Embedder`], [`ontorag_llm::CompletionService`] and
//! [`GraphStore`].

pub mod config;
pub mod context;
pub mod error;
pub mod extractor;
pub mod ontology;
pub mod parser;
pub mod pipeline;
pub mod retrieval;
pub mod runlog;
pub mod store;
pub mod triplet;
pub mod writer;

pub use config::{Config, EmbedderKind};
pub use context::{compose, Answerer, NO_EVIDENCE_ANSWER};
pub use error::{Error, Result};
pub use extractor::{Extraction, ExtractionOutcome, TripletExtractor};
pub use ontology::{Ontology, OntologyStore, SharedOntology};
pub use pipeline::{DocumentReport, IngestSummary, IngestionPipeline, QueryAnswer, QueryEngine};
pub use retrieval::{EvidenceBundle, ExpansionFact, RetrievalExpander, RetrievedChunk};
pub use runlog::RunLog;
pub use store::{EmbeddedGraphStore, GraphStore};
pub use triplet::Triplet;
pub use writer::{GraphWriter, WriteSummary};
