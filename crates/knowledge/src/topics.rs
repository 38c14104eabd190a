//! Index topic tracking.
//!
//! The topic set is a running summary of the subject matter in the index,
//! used only as a routing hint. It grows monotonically; only a full reset
//! clears it.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use arag_core::{AppError, AppResult};
use arag_llm::{complete_json, extract_string_list, LlmClient, LlmRequest, ResponseFormat};
use arag_prompt::{library, OutputFormat, PromptLibrary};
use async_trait::async_trait;

/// Upper bound on the text sent for topic extraction.
const MAX_EXTRACTION_CHARS: usize = 12_000;

/// Normalise a topic: trimmed, lower-cased, inner whitespace collapsed.
pub fn normalize_topic(topic: &str) -> Option<String> {
    let normalized = topic
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Set of normalised topic keywords guarded by a single lock.
#[derive(Debug, Default)]
pub struct TopicSet {
    inner: RwLock<BTreeSet<String>>,
}

impl TopicSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert topics; returns the ones that were not present before.
    pub fn extend<I, S>(&self, topics: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = self.inner.write().unwrap_or_else(|e| e.into_inner());
        topics
            .into_iter()
            .filter_map(|t| normalize_topic(t.as_ref()))
            .filter(|t| set.insert(t.clone()))
            .collect()
    }

    /// Sorted copy of the current topics.
    pub fn snapshot(&self) -> Vec<String> {
        let set = self.inner.read().unwrap_or_else(|e| e.into_inner());
        set.iter().cloned().collect()
    }

    /// Topics joined with ", ".
    pub fn hint(&self) -> String {
        self.snapshot().join(", ")
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Summarises newly added text into short topic keywords.
#[async_trait]
pub trait TopicExtractor: Send + Sync {
    async fn extract(&self, texts: &[String]) -> AppResult<Vec<String>>;
}

/// Topic extractor backed by the `topics` prompt.
pub struct LlmTopicExtractor {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    model: String,
    max_parse_attempts: u32,
}

impl LlmTopicExtractor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        model: impl Into<String>,
        max_parse_attempts: u32,
    ) -> Self {
        Self {
            llm,
            prompts,
            model: model.into(),
            max_parse_attempts,
        }
    }
}

#[async_trait]
impl TopicExtractor for LlmTopicExtractor {
    async fn extract(&self, texts: &[String]) -> AppResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut documents = texts.join("\n\n");
        if documents.len() > MAX_EXTRACTION_CHARS {
            let mut cut = MAX_EXTRACTION_CHARS;
            while !documents.is_char_boundary(cut) {
                cut -= 1;
            }
            documents.truncate(cut);
        }

        let built = self
            .prompts
            .render(library::TOPICS, &[("documents", documents.as_str())])?;

        let format = match built.behavior.format {
            OutputFormat::Json => ResponseFormat::Json,
            OutputFormat::Text => ResponseFormat::Text,
        };
        let request = LlmRequest::new(built.user, &self.model)
            .with_temperature(built.behavior.temperature)
            .with_format(format);

        let map = complete_json(self.llm.as_ref(), &request, self.max_parse_attempts).await?;
        let topics = extract_string_list(&map, "topics");

        if topics.is_empty() {
            return Err(AppError::Llm(
                "Topic extraction returned no topics".to_string(),
            ));
        }

        tracing::debug!("Extracted topics: {:?}", topics);
        Ok(topics)
    }
}
