//! Web search as an evidence source.

use std::time::Duration;

use arag_core::{AppError, AppResult, WebSearchSettings};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::types::EvidenceChunk;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebResult {
    pub content: String,
    pub url: Option<String>,
}

/// External search service returning text snippets for a query.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> AppResult<Vec<WebResult>>;
}

/// Tavily search API client.
#[derive(Debug, Clone)]
pub struct TavilySearcher {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    content: String,
    url: Option<String>,
}

impl TavilySearcher {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Retrieval(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Build a searcher from settings; the API key must be supplied.
    pub fn from_settings(settings: &WebSearchSettings, api_key: Option<String>) -> AppResult<Self> {
        if settings.provider != "tavily" {
            return Err(AppError::Config(format!(
                "Unknown web search provider: '{}'. Supported providers: tavily",
                settings.provider
            )));
        }

        let api_key = api_key.ok_or_else(|| {
            AppError::Config(format!(
                "Web search needs an API key. Set {}",
                settings.api_key_env
            ))
        })?;

        Self::new(settings.endpoint.clone(), api_key)
    }
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, top_k: usize) -> AppResult<Vec<WebResult>> {
        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results: top_k,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Web search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Retrieval(format!(
                "Web search error ({}): {}",
                status, body
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse web search response: {}", e)))?;

        let results: Vec<WebResult> = body
            .results
            .into_iter()
            .filter(|hit| !hit.content.trim().is_empty())
            .take(top_k)
            .map(|hit| WebResult {
                content: hit.content,
                url: hit.url,
            })
            .collect();

        debug!("Web search returned {} results", results.len());
        Ok(results)
    }
}

/// Search the web and fold the results into a single evidence chunk.
///
/// Web evidence carries no provenance. An empty result set is an error so
/// the caller never generates from nothing.
pub async fn web_evidence(
    searcher: &dyn WebSearcher,
    question: &str,
    top_k: usize,
) -> AppResult<EvidenceChunk> {
    let results = searcher.search(question, top_k).await?;
    if results.is_empty() {
        return Err(AppError::Retrieval(format!(
            "Web search returned no results for '{}'",
            question
        )));
    }

    let text = results
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(EvidenceChunk::new(text, None))
}
