//! In-process fakes for workflow scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use arag_core::{AppError, AppResult, WorkflowSettings};
use arag_knowledge::embeddings::providers::mock::MockProvider;
use arag_knowledge::{
    Document, EvidenceStore, LlmTopicExtractor, StoreConfig, WebResult, WebSearcher,
};
use arag_llm::{LlmClient, LlmRequest, LlmResponse};
use arag_prompt::PromptLibrary;
use async_trait::async_trait;
use tempfile::TempDir;

use crate::engine::WorkflowEngine;
use crate::prompting::{ModelNames, PromptRunner};

// Phrases that identify each built-in prompt
pub const ROUTER: &str = "expert at routing";
pub const RELEVANCE: &str = "relevance of a retrieved document";
pub const GROUNDED: &str = "grounded in / supported by";
pub const USEFUL: &str = "useful to resolve";
pub const REWRITE: &str = "question re-writer";
pub const EXPAND: &str = "different versions of the";
pub const GENERATE: &str = "helpful and conversational assistant";
pub const TOPICS: &str = "Extract ONLY the main topics";

type Responder = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Language model that answers from a script keyed on prompt text.
pub struct ScriptedLlm {
    rules: Vec<(&'static str, Responder)>,
    calls: Mutex<Vec<&'static str>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always reply `reply` to prompts containing `phrase`.
    pub fn on(self, phrase: &'static str, reply: &'static str) -> Self {
        self.on_fn(phrase, move |_| reply.to_string())
    }

    /// Reply with each of `replies` in turn, repeating the last one.
    pub fn on_seq(self, phrase: &'static str, replies: Vec<&'static str>) -> Self {
        let next = AtomicUsize::new(0);
        self.on_fn(phrase, move |_| {
            let i = next.fetch_add(1, Ordering::SeqCst).min(replies.len() - 1);
            replies[i].to_string()
        })
    }

    /// Compute the reply from the rendered prompt.
    pub fn on_fn(
        mut self,
        phrase: &'static str,
        reply: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.rules.push((phrase, Box::new(reply)));
        self
    }

    /// Number of calls whose prompt matched `phrase`.
    pub fn calls(&self, phrase: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| **p == phrase)
            .count()
    }

    /// Rendered prompts that matched `phrase`, in call order.
    pub fn prompts_for(&self, phrase: &str) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(phrase))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());

        for (phrase, reply) in &self.rules {
            if request.prompt.contains(phrase) {
                self.calls.lock().unwrap().push(*phrase);
                return Ok(LlmResponse::text(reply(&request.prompt), request.model.clone()));
            }
        }

        Err(AppError::Llm(format!(
            "No scripted reply for prompt: {}",
            request.prompt.lines().next().unwrap_or_default()
        )))
    }
}

/// Web searcher returning canned snippets.
pub struct StubSearcher {
    results: Vec<&'static str>,
    pub calls: AtomicUsize,
}

impl StubSearcher {
    pub fn new(results: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            results,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WebSearcher for StubSearcher {
    async fn search(&self, _query: &str, top_k: usize) -> AppResult<Vec<WebResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .results
            .iter()
            .take(top_k)
            .map(|content| WebResult {
                content: content.to_string(),
                url: None,
            })
            .collect())
    }
}

pub const WHALE_TEXT: &str = "Whales are big and blue and live in the ocean.";

/// Engine wired to a scripted model, a temporary evidence store, and an
/// optional stub web searcher.
pub struct Harness {
    pub engine: WorkflowEngine,
    pub llm: Arc<ScriptedLlm>,
    pub store: Arc<EvidenceStore>,
    _dir: TempDir,
}

pub struct HarnessBuilder {
    llm: ScriptedLlm,
    documents: Vec<Document>,
    web: Option<Arc<StubSearcher>>,
    settings: WorkflowSettings,
}

impl HarnessBuilder {
    pub fn new(llm: ScriptedLlm) -> Self {
        Self {
            llm,
            documents: Vec::new(),
            web: None,
            settings: WorkflowSettings::default(),
        }
    }

    pub fn document(mut self, text: &str, provenance: &str) -> Self {
        self.documents.push(Document::new(text, provenance));
        self
    }

    pub fn web(mut self, searcher: Arc<StubSearcher>) -> Self {
        self.web = Some(searcher);
        self
    }

    pub fn max_hops(mut self, max_hops: u32) -> Self {
        self.settings.max_hops = max_hops;
        self
    }

    pub async fn build(self) -> Harness {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(self.llm);
        let prompts = Arc::new(PromptLibrary::builtin().unwrap());

        let extractor = LlmTopicExtractor::new(
            llm.clone(),
            prompts.clone(),
            "mistral",
            self.settings.max_parse_attempts,
        );
        let store = EvidenceStore::open(
            StoreConfig::new(dir.path().join("index.sqlite")),
            Arc::new(MockProvider::new(256)),
        )
        .await
        .unwrap()
        .with_topic_extractor(Arc::new(extractor));

        if !self.documents.is_empty() {
            store.add(&self.documents).await.unwrap();
        }
        let store = Arc::new(store);

        let runner = PromptRunner::new(
            llm.clone(),
            prompts,
            ModelNames::new("deepseek-r1:7b", "mistral"),
            self.settings.max_parse_attempts,
        );
        let mut engine = WorkflowEngine::new(runner, store.clone(), self.settings);
        if let Some(web) = self.web {
            engine = engine.with_web_search(web, 3);
        }

        Harness {
            engine,
            llm,
            store,
            _dir: dir,
        }
    }
}

/// Script for a question the index covers: every grader says yes.
pub fn whale_script() -> ScriptedLlm {
    ScriptedLlm::new()
        .on(TOPICS, r#"{"topics": ["whales", "ocean"]}"#)
        .on_fn(ROUTER, |prompt| {
            if prompt.contains("questions regarding ocean, whales") {
                r#"{"datasource": "vectorstore"}"#.to_string()
            } else {
                r#"{"datasource": "direct"}"#.to_string()
            }
        })
        .on(EXPAND, r#"{"queries": ["Describe whales", "Tell me about whales"]}"#)
        .on(RELEVANCE, r#"{"score": "yes"}"#)
        .on(
            GENERATE,
            "<think>\nThe context says whales are big.\n</think>\nWhales are big blue animals that live in the ocean.",
        )
        .on(GROUNDED, r#"{"score": "yes"}"#)
        .on(USEFUL, r#"{"score": "yes"}"#)
}
