//! Evidence store: segment, embed, persist, and retrieve documents.
//!
//! SQLite access runs on blocking threads with a fresh connection per
//! operation. The topic set lives in memory and is mirrored to the index so
//! that every process sees the topics of earlier ingestion runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use arag_core::{AppError, AppResult};
use tracing::{debug, info, instrument, warn};

use crate::chunker::{chunk_document, chunk_id};
use crate::config::StoreConfig;
use crate::embeddings::EmbeddingProvider;
use crate::index;
use crate::topics::{TopicExtractor, TopicSet};
use crate::types::{AddStats, Document, EvidenceChunk, IndexStats, StoredChunk};

/// Persistent vector-indexed collection of evidence chunks.
pub struct EvidenceStore {
    config: StoreConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Option<Arc<dyn TopicExtractor>>,
    topics: TopicSet,
}

impl std::fmt::Debug for EvidenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceStore")
            .field("db_path", &self.config.db_path)
            .field("embedder", &self.embedder.provider_name())
            .field("topics", &self.topics.len())
            .finish()
    }
}

impl EvidenceStore {
    /// Open (creating if needed) the store and load persisted topics.
    pub async fn open(config: StoreConfig, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        config.validate()?;

        let db_path = config.db_path.clone();
        let persisted = blocking(move || {
            let conn = index::init_index(&db_path)?;
            index::load_topics(&conn)
        })
        .await?;

        let topics = TopicSet::new();
        topics.extend(persisted);

        debug!(
            "Opened evidence store at {:?} ({} topics)",
            config.db_path,
            topics.len()
        );

        Ok(Self {
            config,
            embedder,
            extractor: None,
            topics,
        })
    }

    /// Summarise added documents into topics with `extractor`.
    pub fn with_topic_extractor(mut self, extractor: Arc<dyn TopicExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.config.db_path
    }

    /// Segment, embed, and persist documents, then refresh the topic set.
    ///
    /// Segments become visible to queries only after the whole batch is
    /// committed. A topic extraction failure is logged and reported through
    /// `topics_updated`; the segments stay indexed.
    #[instrument(skip(self, documents), fields(documents = documents.len()))]
    pub async fn add(&self, documents: &[Document]) -> AppResult<AddStats> {
        let start = Instant::now();
        let mut stats = AddStats::default();

        let mut candidates = Vec::new();
        for document in documents {
            let chunks =
                chunk_document(document, self.config.chunk_tokens, self.config.chunk_overlap)?;
            if chunks.is_empty() {
                warn!("Skipping empty document '{}'", document.provenance);
                continue;
            }
            stats.documents += 1;
            candidates.extend(chunks);
        }

        if candidates.is_empty() {
            info!("No content to index");
            return Ok(stats);
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != candidates.len() {
            return Err(AppError::Knowledge(format!(
                "Embedding provider returned {} vectors for {} segments",
                embeddings.len(),
                candidates.len()
            )));
        }

        let stored: Vec<StoredChunk> = candidates
            .into_iter()
            .zip(embeddings)
            .map(|(candidate, embedding)| StoredChunk {
                id: chunk_id(&candidate.provenance, candidate.position, &candidate.text),
                provenance: candidate.provenance,
                position: candidate.position,
                text: candidate.text,
                embedding,
            })
            .collect();

        let db_path = self.config.db_path.clone();
        let inserted = blocking(move || {
            let mut conn = index::init_index(&db_path)?;
            index::insert_chunks(&mut conn, &stored)
        })
        .await?;
        stats.chunks = inserted as u32;

        info!(
            "Indexed {} segments from {} documents in {:.2}s",
            stats.chunks,
            stats.documents,
            start.elapsed().as_secs_f64()
        );

        if let Some(extractor) = &self.extractor {
            match extractor.extract(&texts).await {
                Ok(extracted) => {
                    let new_topics = self.topics.extend(&extracted);
                    if !new_topics.is_empty() {
                        let db_path = self.config.db_path.clone();
                        let to_persist = new_topics.clone();
                        blocking(move || {
                            let mut conn = index::init_index(&db_path)?;
                            index::insert_topics(&mut conn, &to_persist)
                        })
                        .await?;
                    }
                    debug!("Topic set now has {} entries", self.topics.len());
                    stats.topics_updated = true;
                    stats.new_topics = new_topics;
                }
                Err(e) => {
                    warn!("Topic extraction failed, topic set unchanged: {}", e);
                }
            }
        }

        Ok(stats)
    }

    /// Return up to `k` segments most similar to `text`, best first.
    #[instrument(skip(self, text))]
    pub async fn query(&self, text: &str, k: usize) -> AppResult<Vec<EvidenceChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to embed query: {}", e)))?;

        let db_path = self.config.db_path.clone();
        let results = blocking(move || {
            let conn = index::init_index(&db_path)?;
            index::query_chunks(&conn, &embedding, k)
        })
        .await
        .map_err(|e| AppError::Retrieval(e.to_string()))?;

        Ok(results
            .into_iter()
            .map(|(chunk, score)| {
                debug!(id = %chunk.id, score, "Retrieved segment");
                EvidenceChunk::from(chunk)
            })
            .collect())
    }

    /// Sorted snapshot of the topic set.
    pub fn topics(&self) -> Vec<String> {
        self.topics.snapshot()
    }

    /// Topic set rendered as a comma-separated routing hint.
    pub fn topic_hint(&self) -> String {
        self.topics.hint()
    }

    pub async fn stats(&self) -> AppResult<IndexStats> {
        let db_path = self.config.db_path.clone();
        let (documents, chunks, topics, last_ingested_at) = blocking(move || {
            let conn = index::init_index(&db_path)?;
            index::get_stats(&conn)
        })
        .await?;

        let db_size_bytes = std::fs::metadata(&self.config.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(IndexStats {
            documents,
            chunks,
            topics,
            db_size_bytes,
            last_ingested_at,
        })
    }

    /// Remove every segment and topic.
    pub async fn reset(&self) -> AppResult<()> {
        let db_path = self.config.db_path.clone();
        blocking(move || {
            let conn = index::init_index(&db_path)?;
            index::reset_index(&conn)
        })
        .await?;
        self.topics.clear();
        Ok(())
    }
}

async fn blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Knowledge(format!("Index task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::mock::MockProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FixedTopics {
        topics: Vec<String>,
        calls: AtomicUsize,
    }

    impl FixedTopics {
        fn new(topics: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                topics: topics.iter().map(|t| t.to_string()).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TopicExtractor for FixedTopics {
        async fn extract(&self, _texts: &[String]) -> AppResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.topics.clone())
        }
    }

    struct FailingTopics;

    #[async_trait]
    impl TopicExtractor for FailingTopics {
        async fn extract(&self, _texts: &[String]) -> AppResult<Vec<String>> {
            Err(AppError::Llm("model unavailable".to_string()))
        }
    }

    async fn open_store(dir: &TempDir) -> EvidenceStore {
        let config = StoreConfig::new(dir.path().join("index.sqlite"));
        EvidenceStore::open(config, Arc::new(MockProvider::new(256)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_then_query_returns_document() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir)
            .await
            .with_topic_extractor(FixedTopics::new(&["whales", "oceans"]));

        let stats = store
            .add(&[Document::new(
                "Whales are big and blue and live in the ocean.",
                "doc1",
            )])
            .await
            .unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.chunks, 1);
        assert!(stats.topics_updated);

        let results = store.query("Where do whales live?", 4).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].text.contains("ocean"));
        assert_eq!(results[0].provenance.as_deref(), Some("doc1"));
        assert_eq!(store.topics(), vec!["oceans", "whales"]);
    }

    #[tokio::test]
    async fn test_query_ranks_relevant_document_first() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store
            .add(&[
                Document::new("Compilers translate source code into machine code.", "compilers"),
                Document::new("Whales are big and blue and live in the ocean.", "whales"),
                Document::new("Bread needs flour, water, yeast and salt.", "bread"),
            ])
            .await
            .unwrap();

        let results = store.query("whales ocean", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].provenance.as_deref(), Some("whales"));
    }

    #[tokio::test]
    async fn test_query_with_exact_text_returns_that_document_first() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store
            .add(&[
                Document::new("Compilers translate source code into machine code.", "compilers"),
                Document::new("Whales are big and blue and live in the ocean.", "doc1"),
            ])
            .await
            .unwrap();

        let results = store
            .query("Whales are big and blue and live in the ocean.", 4)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].provenance.as_deref(), Some("doc1"));
        assert_eq!(results[0].text, "Whales are big and blue and live in the ocean.");
    }

    #[tokio::test]
    async fn test_query_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        assert!(store.query("anything", 4).await.unwrap().is_empty());
        assert!(store.query("anything", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_topics_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let extractor = FixedTopics::new(&["whales"]);
        let store = open_store(&dir).await.with_topic_extractor(extractor.clone());

        let first = store
            .add(&[Document::new("Whales live in the ocean.", "a")])
            .await
            .unwrap();
        let second = store
            .add(&[Document::new("Blue whales are the largest whales.", "b")])
            .await
            .unwrap();

        assert_eq!(first.new_topics, vec!["whales"]);
        assert!(second.new_topics.is_empty());
        assert!(second.topics_updated);
        assert_eq!(store.topics(), vec!["whales"]);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_topic_failure_keeps_segments() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir)
            .await
            .with_topic_extractor(Arc::new(FailingTopics));

        let stats = store
            .add(&[Document::new("Whales live in the ocean.", "a")])
            .await
            .unwrap();

        assert_eq!(stats.chunks, 1);
        assert!(!stats.topics_updated);
        assert!(store.topics().is_empty());
        assert_eq!(store.query("whales", 4).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_topics_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir)
                .await
                .with_topic_extractor(FixedTopics::new(&["Whales", "Oceans"]));
            store
                .add(&[Document::new("Whales live in the ocean.", "a")])
                .await
                .unwrap();
        }

        let reopened = open_store(&dir).await;
        assert_eq!(reopened.topic_hint(), "oceans, whales");
    }

    #[tokio::test]
    async fn test_empty_documents_are_skipped() {
        let dir = TempDir::new().unwrap();
        let extractor = FixedTopics::new(&["whales"]);
        let store = open_store(&dir).await.with_topic_extractor(extractor.clone());

        let stats = store.add(&[Document::new("   \n", "blank")]).await.unwrap();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.chunks, 0);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stats_and_reset() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir)
            .await
            .with_topic_extractor(FixedTopics::new(&["whales"]));

        store
            .add(&[
                Document::new("Whales live in the ocean.", "a"),
                Document::new("Krill are small crustaceans.", "b"),
            ])
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.topics, 1);
        assert!(stats.db_size_bytes > 0);
        assert!(stats.last_ingested_at.is_some());

        store.reset().await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.topics, 0);
        assert!(store.topics().is_empty());
    }

    #[tokio::test]
    async fn test_reingesting_same_document_replaces_segments() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let doc = Document::new("Whales live in the ocean.", "a");

        store.add(std::slice::from_ref(&doc)).await.unwrap();
        store.add(std::slice::from_ref(&doc)).await.unwrap();

        assert_eq!(store.stats().await.unwrap().chunks, 1);
    }
}
