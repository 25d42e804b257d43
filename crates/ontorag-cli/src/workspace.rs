//! Opening on-disk state and wiring collaborators from configuration.

use anyhow::{Context, Result};
use ontorag_core::{
    Answerer, Config, EmbedderKind, EmbeddedGraphStore, IngestionPipeline, OntologyStore,
    QueryEngine, RetrievalExpander, RunLog, SharedOntology,
};
use ontorag_docs::RecursiveCharacterSplitter;
use ontorag_llm::{Embedder, LLMConfig, OpenAIClient, TokenHashEmbedder};
use std::sync::Arc;

pub struct Workspace {
    pub config: Config,
    pub store: Arc<EmbeddedGraphStore>,
}

impl Workspace {
    pub fn open(config: Config) -> Result<Self> {
        let path = config.graph_path();
        let store = EmbeddedGraphStore::open(&path)
            .with_context(|| format!("failed to open graph {}", path.display()))?;
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    pub fn ontology(&self) -> Result<SharedOntology> {
        let path = self.config.ontology_path();
        let store = OntologyStore::open(&path)
            .with_context(|| format!("failed to load ontology {}", path.display()))?;
        Ok(store.shared())
    }

    pub fn run_log(&self) -> Result<RunLog> {
        let path = self.config.runlog_path();
        RunLog::open(&path).with_context(|| format!("failed to load run log {}", path.display()))
    }

    pub fn ingestion_pipeline(&self) -> Result<IngestionPipeline> {
        let llm_config = llm_config()?;
        let splitter =
            RecursiveCharacterSplitter::new(self.config.chunk_size, self.config.chunk_overlap)?;
        let llm = OpenAIClient::new(llm_config.clone())?;
        Ok(IngestionPipeline::new(
            Arc::new(splitter),
            self.embedder(&llm_config)?,
            Arc::new(llm),
            self.store.clone(),
            self.ontology()?,
        )
        .with_extract_concurrency(self.config.extract_concurrency))
    }

    pub fn query_engine(&self) -> Result<QueryEngine> {
        let llm_config = llm_config()?;
        let expander = RetrievalExpander::new(self.embedder(&llm_config)?, self.store.clone())
            .with_top_k(self.config.top_k)
            .with_max_expansion_facts(self.config.max_expansion_facts);
        let answerer = Answerer::new(Arc::new(OpenAIClient::new(llm_config.for_answers())?));
        Ok(QueryEngine::new(expander, answerer).with_max_context_chars(self.config.max_context_chars))
    }

    fn embedder(&self, llm_config: &LLMConfig) -> Result<Arc<dyn Embedder>> {
        Ok(match self.config.embedder {
            EmbedderKind::Openai => Arc::new(OpenAIClient::new(llm_config.clone())?),
            EmbedderKind::TokenHash => Arc::new(TokenHashEmbedder::default()),
        })
    }
}

fn llm_config() -> Result<LLMConfig> {
    LLMConfig::from_env().context("set OPENAI_API_KEY (and optionally OPENAI_BASE_URL) to reach a model")
}
