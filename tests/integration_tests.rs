//! Integration tests for the complete ontorag pipeline
//!
//! These tests drive the crates together against on-disk state:
//! - documents → chunks → extraction → ontology growth → graph
//! - graph → retrieval → composed context → answer
//! - run log and snapshots across process restarts
//!
//! The model is scripted with `MockCompletion`; embeddings come from the
//! offline token-hash embedder.
//!
//! Run with: cargo test --test integration_tests

use ontorag_core::{
    Answerer, Config, EmbeddedGraphStore, GraphStore, IngestSummary, IngestionPipeline,
    OntologyStore, QueryEngine, RetrievalExpander, RunLog, NO_EVIDENCE_ANSWER,
};
use ontorag_docs::{RecursiveCharacterSplitter, SourceDocument};
use ontorag_llm::{MockCompletion, TokenHashEmbedder};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

const FINANCE_TEXT: &str = "The Ministry of Finance is headed by Nirmala Sitharaman. \
     It announced the Fiscal Responsibility Act.";
const FINANCE_TRIPLETS: &str = r#"```json
[
  ["Ministry of Finance", "ministry", "has_minister", "Nirmala Sitharaman", "person"],
  ["Ministry of Finance", "ministry", "announced", "Fiscal Responsibility Act", "policy"]
]
```"#;

const GANGA_TEXT: &str = "The National Mission for Clean Ganga was launched by the Ministry of Jal Shakti.";
const GANGA_TRIPLETS: &str = r#"[["Ministry of Jal Shakti", "ministry", "NEW_RELATION_TYPE:launched", "National Mission for Clean Ganga", "NEW_ENTITY_TYPE:mission"]]"#;

struct State {
    config: Config,
    store: Arc<EmbeddedGraphStore>,
}

fn open_state(root: &Path) -> State {
    let config = Config {
        data_dir: root.join("data"),
        state_dir: root.join("state"),
        ..Config::default()
    };
    let store = Arc::new(EmbeddedGraphStore::open(config.graph_path()).unwrap());
    State { config, store }
}

fn pipeline(state: &State, llm: Arc<MockCompletion>) -> IngestionPipeline {
    let ontology = OntologyStore::open(state.config.ontology_path()).unwrap().shared();
    IngestionPipeline::new(
        Arc::new(RecursiveCharacterSplitter::default()),
        Arc::new(TokenHashEmbedder::default()),
        llm,
        state.store.clone(),
        ontology,
    )
}

fn query_engine(state: &State, llm: Arc<MockCompletion>) -> QueryEngine {
    QueryEngine::new(
        RetrievalExpander::new(Arc::new(TokenHashEmbedder::default()), state.store.clone()),
        Answerer::new(llm),
    )
}

// ============================================================================
// Ingestion
// ============================================================================

#[tokio::test]
async fn test_ingesting_twice_matches_ingesting_once() {
    let dir = tempdir().unwrap();
    let state = open_state(dir.path());
    let llm = Arc::new(MockCompletion::always(FINANCE_TRIPLETS));
    let doc = SourceDocument::from_text("finance", FINANCE_TEXT);

    let pipeline = pipeline(&state, llm);
    let first = pipeline.ingest_document(&doc).await.unwrap();
    let once = state.store.stats().await.unwrap();
    let second = pipeline.ingest_document(&doc).await.unwrap();
    let twice = state.store.stats().await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(first.triplets_written, 2);
    assert_eq!(second.triplets_written, 2);
    assert_eq!(once.documents, 1);
    assert_eq!(once.chunks, 1);
    assert_eq!(once.entities, 3);
    assert_eq!(once.edges, 2);
    assert_eq!(once.mentions, 3);
}

#[tokio::test]
async fn test_new_types_are_persisted_before_facts_are_written() {
    let dir = tempdir().unwrap();
    let state = open_state(dir.path());
    let llm = Arc::new(MockCompletion::always(GANGA_TRIPLETS));

    let report = pipeline(&state, llm)
        .ingest_document(&SourceDocument::from_text("ganga", GANGA_TEXT))
        .await
        .unwrap();
    assert_eq!(report.triplets_written, 1);
    assert!(report.new_entity_types.contains("mission"));
    assert!(report.new_relation_types.contains("launched"));

    let reloaded = OntologyStore::open(state.config.ontology_path()).unwrap();
    assert!(reloaded.contains_entity_type("mission"));
    assert!(reloaded.contains_relation_type("launched"));
    assert!(reloaded.contains_entity_type("budget item"));

    let stats = state.store.stats().await.unwrap();
    assert_eq!(stats.labels.get("Mission"), Some(&1));
    assert_eq!(stats.rel_types.get("LAUNCHED"), Some(&1));
}

#[tokio::test]
async fn test_garbage_model_output_writes_nothing() {
    let dir = tempdir().unwrap();
    let state = open_state(dir.path());
    let llm = Arc::new(MockCompletion::always("I'm sorry, I can't find any triplets."));

    let report = pipeline(&state, llm)
        .ingest_document(&SourceDocument::from_text("finance", FINANCE_TEXT))
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.triplets_written, 0);
    let stats = state.store.stats().await.unwrap();
    assert_eq!(stats.chunks, 1);
    assert_eq!(stats.entities, 0);
}

#[tokio::test]
async fn test_directory_run_is_resumable() {
    let dir = tempdir().unwrap();
    let state = open_state(dir.path());
    std::fs::create_dir_all(&state.config.data_dir).unwrap();
    std::fs::write(state.config.data_dir.join("finance.txt"), FINANCE_TEXT).unwrap();

    let llm = Arc::new(MockCompletion::always(FINANCE_TRIPLETS));
    let mut log = RunLog::open(state.config.runlog_path()).unwrap();
    let summary = pipeline(&state, llm.clone())
        .ingest_dir(&state.config.data_dir, &mut log)
        .await
        .unwrap();
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(llm.call_count(), 1);

    // A second document arrives; a fresh process only ingests that one.
    std::fs::write(state.config.data_dir.join("ganga.txt"), GANGA_TEXT).unwrap();
    let restarted = open_state(dir.path());
    let llm = Arc::new(MockCompletion::always(GANGA_TRIPLETS));
    let mut log = RunLog::open(restarted.config.runlog_path()).unwrap();
    let summary = pipeline(&restarted, llm.clone())
        .ingest_dir(&restarted.config.data_dir, &mut log)
        .await
        .unwrap();
    assert_eq!(summary.skipped, vec!["finance.txt"]);
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].doc_id, "ganga");
    assert_eq!(llm.call_count(), 1);

    let raw: Vec<String> =
        serde_json::from_str(&std::fs::read_to_string(restarted.config.runlog_path()).unwrap())
            .unwrap();
    assert_eq!(raw, vec!["finance.txt", "ganga.txt"]);
    let stats = restarted.store.stats().await.unwrap();
    assert_eq!(stats.documents, 2);
}

#[tokio::test]
async fn test_single_file_and_directory_share_the_run_log() {
    let dir = tempdir().unwrap();
    let state = open_state(dir.path());
    std::fs::create_dir_all(&state.config.data_dir).unwrap();
    let finance = state.config.data_dir.join("finance.txt");
    std::fs::write(&finance, FINANCE_TEXT).unwrap();

    let llm = Arc::new(MockCompletion::always(FINANCE_TRIPLETS));
    let pipeline = pipeline(&state, llm.clone());
    let mut log = RunLog::open(state.config.runlog_path()).unwrap();

    let mut summary = IngestSummary::default();
    let result = pipeline.ingest_file(&finance, &mut log).await;
    summary.record(&finance, result);
    assert_eq!(summary.reports.len(), 1);
    assert!(log.contains("finance.txt"));

    summary.merge(pipeline.ingest_dir(&state.config.data_dir, &mut log).await.unwrap());
    let result = pipeline.ingest_file(&finance, &mut log).await;
    summary.record(&finance, result);
    assert_eq!(summary.skipped, vec!["finance.txt", "finance.txt"]);
    assert!(summary.failed.is_empty());
    assert_eq!(llm.call_count(), 1);
}

// ============================================================================
// Query
// ============================================================================

#[tokio::test]
async fn test_empty_graph_answers_with_stock_reply() {
    let dir = tempdir().unwrap();
    let state = open_state(dir.path());
    let llm = Arc::new(MockCompletion::always("unused"));

    let answer = query_engine(&state, llm.clone())
        .ask("Who heads the Ministry of Finance?")
        .await
        .unwrap();
    assert_eq!(answer.answer, NO_EVIDENCE_ANSWER);
    assert!(answer.evidence.is_empty());
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_question_is_answered_from_expanded_graph() {
    let dir = tempdir().unwrap();
    let state = open_state(dir.path());
    let extractor_llm = Arc::new(MockCompletion::new(vec![
        FINANCE_TRIPLETS.to_string(),
        GANGA_TRIPLETS.to_string(),
    ]));
    let ingest = pipeline(&state, extractor_llm);
    ingest
        .ingest_document(&SourceDocument::from_text("finance", FINANCE_TEXT))
        .await
        .unwrap();
    ingest
        .ingest_document(&SourceDocument::from_text("ganga", GANGA_TEXT))
        .await
        .unwrap();

    let answer_llm = Arc::new(MockCompletion::always("Nirmala Sitharaman."));
    let answer = query_engine(&state, answer_llm.clone())
        .ask("Who heads the Ministry of Finance?")
        .await
        .unwrap();

    assert_eq!(answer.answer, "Nirmala Sitharaman.");
    assert_eq!(answer.evidence.chunks[0].chunk_id, "finance:0");
    assert!(answer.context.starts_with("Chunk 1:\nThe Ministry of Finance"));
    assert!(answer.context.contains("- Nirmala Sitharaman (Person)"));
    assert!(answer.context.contains(
        "Expanded facts:\nMinistry of Finance (Ministry) --[HAS_MINISTER]--> Nirmala Sitharaman (Person)"
    ));
    assert!(answer
        .context
        .contains("Ministry of Finance (Ministry) --[ANNOUNCED]--> Fiscal Responsibility Act (Policy)"));

    let prompt = &answer_llm.prompts()[0];
    assert!(prompt.starts_with(
        "Answer the following question using only the information in the context."
    ));
    assert!(prompt.contains("Question: Who heads the Ministry of Finance?"));
    assert!(prompt.ends_with("Answer:"));
}

#[tokio::test]
async fn test_graph_survives_restart() {
    let dir = tempdir().unwrap();
    {
        let state = open_state(dir.path());
        let llm = Arc::new(MockCompletion::always(FINANCE_TRIPLETS));
        pipeline(&state, llm)
            .ingest_document(&SourceDocument::from_text("finance", FINANCE_TEXT))
            .await
            .unwrap();
    }

    let state = open_state(dir.path());
    let stats = state.store.stats().await.unwrap();
    assert_eq!(stats.entities, 3);
    assert_eq!(stats.edges, 2);

    let answer = query_engine(&state, Arc::new(MockCompletion::always("ok")))
        .ask("What did the Ministry of Finance announce?")
        .await
        .unwrap();
    assert_eq!(answer.evidence.expansion_triples.len(), 2);
}
