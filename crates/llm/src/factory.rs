//! LLM provider factory.
//!
//! This module creates LLM clients from application configuration. Every
//! client it returns is wrapped in a [`RetryingClient`] so callers get
//! per-call timeouts and bounded retries without further setup.

use std::sync::Arc;
use std::time::Duration;

use arag_core::{AppConfig, AppError, AppResult};

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use crate::retry::{RetryPolicy, RetryingClient, INITIAL_BACKOFF_MS};
use crate::types::ProviderType;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier (currently only "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `policy` - Timeout and retry policy applied to every call
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    policy: RetryPolicy,
) -> AppResult<Arc<dyn LlmClient>> {
    let inner: Arc<dyn LlmClient> = match ProviderType::parse(provider) {
        Some(ProviderType::Ollama) => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            Arc::new(OllamaClient::with_base_url(base_url))
        }
        None => {
            return Err(AppError::Config(format!("Unknown provider: {}", provider)));
        }
    };

    tracing::debug!(
        provider = inner.provider_name(),
        max_attempts = policy.max_attempts,
        timeout = ?policy.timeout,
        "Created LLM client"
    );

    Ok(Arc::new(RetryingClient::new(inner, policy)))
}

/// Create the LLM client described by the application configuration.
pub fn client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let policy = RetryPolicy {
        max_attempts: config.workflow.max_retries,
        timeout: Duration::from_secs(config.request_timeout_secs),
        initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
    };
    create_client(&config.provider, Some(&config.endpoint), policy)
}
