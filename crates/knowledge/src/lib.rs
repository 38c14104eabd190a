//! Evidence sources for the adaptive RAG assistant.
//!
//! Provides the local-first Evidence Store (SQLite + embeddings), the
//! topic set that summarises it, document loading, and web search.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod parser;
pub mod store;
pub mod topics;
pub mod types;
pub mod web;

// Re-export commonly used types
pub use config::StoreConfig;
pub use embeddings::{create_provider, EmbeddingProvider};
pub use ingest::{load_documents, LoadedDocuments};
pub use store::EvidenceStore;
pub use topics::{LlmTopicExtractor, TopicExtractor};
pub use types::{AddStats, Document, EvidenceChunk, IndexStats};
pub use web::{web_evidence, TavilySearcher, WebResult, WebSearcher};

use std::sync::Arc;

use arag_core::{AppConfig, AppResult};
use arag_llm::LlmClient;
use arag_prompt::PromptLibrary;

/// Open the workspace evidence store with its configured embedder and an
/// LLM-backed topic extractor.
pub async fn open_store(
    config: &AppConfig,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
) -> AppResult<EvidenceStore> {
    let store_config = StoreConfig::from_app_config(config)?;
    let embedder = create_provider(&config.index, &config.endpoint)?;
    let extractor = LlmTopicExtractor::new(
        llm,
        prompts,
        config.rag_model.clone(),
        config.workflow.max_parse_attempts,
    );

    let store = EvidenceStore::open(store_config, embedder)
        .await?
        .with_topic_extractor(Arc::new(extractor));

    tracing::debug!("Opened {:?}", store);
    Ok(store)
}
