//! Configuration management for the adaptive RAG assistant.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config files (.arag/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with all state stored in `.arag/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Known language-model providers.
const KNOWN_PROVIDERS: [&str; 1] = ["ollama"];

/// Known embedding providers.
const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["ollama", "mock"];

/// Main application configuration.
///
/// Holds the resolved settings every crate reads: which models to call,
/// how the workflow loop is bounded, how the index is built, and where the
/// web searcher lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .arag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Language model provider (currently "ollama")
    pub provider: String,

    /// Provider endpoint
    pub endpoint: String,

    /// Model used for answer generation
    pub chat_model: String,

    /// Model used for routing, grading, and rewriting
    pub rag_model: String,

    /// Per-call timeout for model requests, in seconds
    pub request_timeout_secs: u64,

    /// Workflow loop settings
    pub workflow: WorkflowSettings,

    /// Evidence index settings
    pub index: IndexSettings,

    /// Web search settings
    pub web_search: WebSearchSettings,

    /// Log level override
    pub log_level: Option<String>,

    /// Log output format ("text" or "json")
    pub log_format: String,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Raw provider table from config.yaml
    pub llm: Option<LlmConfig>,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: String,

    #[serde(rename = "chatModel")]
    pub chat_model: Option<String>,

    #[serde(rename = "ragModel")]
    pub rag_model: Option<String>,

    #[serde(rename = "embeddingModel")]
    pub embedding_model: Option<String>,

    /// Per-call timeout in seconds
    pub timeout: Option<u64>,
}

/// Bounds and sizes of the adaptive retrieval loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    /// Maximum node executions before the engine forces termination
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,

    /// Paraphrases generated for multi-query retrieval
    #[serde(default = "default_fan_out_queries")]
    pub fan_out_queries: u32,

    /// Nearest neighbours fetched per retrieval query
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Attempts per model call on timeout or transport errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Re-asks for malformed structured output
    #[serde(default = "default_max_parse_attempts")]
    pub max_parse_attempts: u32,

    /// Prior conversation messages shown to the generator
    #[serde(default = "default_history_turns")]
    pub history_turns: u32,
}

fn default_max_hops() -> u32 {
    15
}

fn default_fan_out_queries() -> u32 {
    3
}

fn default_top_k() -> u32 {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_parse_attempts() -> u32 {
    2
}

fn default_history_turns() -> u32 {
    6
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            fan_out_queries: default_fan_out_queries(),
            top_k: default_top_k(),
            max_retries: default_max_retries(),
            max_parse_attempts: default_max_parse_attempts(),
            history_turns: default_history_turns(),
        }
    }
}

/// Evidence index settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    /// Embedding provider: "ollama" or "mock"
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,

    /// Embedding model (provider-specific)
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Target segment size in tokens
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,

    /// Overlap between segments in tokens
    #[serde(default)]
    pub chunk_overlap: usize,
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_dimensions() -> usize {
    768
}

fn default_chunk_tokens() -> usize {
    250
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
            dimensions: default_dimensions(),
            chunk_tokens: default_chunk_tokens(),
            chunk_overlap: 0,
        }
    }
}

/// Web search settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchSettings {
    #[serde(default = "default_search_provider")]
    pub provider: String,

    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the API key
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Results concatenated into the web evidence chunk
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_search_provider() -> String {
    "tavily".to_string()
}

fn default_search_endpoint() -> String {
    "https://api.tavily.com/search".to_string()
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_max_results() -> u32 {
    3
}

impl Default for WebSearchSettings {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            endpoint: default_search_endpoint(),
            api_key_env: default_search_key_env(),
            max_results: default_max_results(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workflow: Option<WorkflowSettings>,
    index: Option<IndexSettings>,
    web_search: Option<WebSearchSettings>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            endpoint: "http://localhost:11434".to_string(),
            chat_model: "deepseek-r1:7b".to_string(),
            rag_model: "mistral".to_string(),
            request_timeout_secs: 60,
            workflow: WorkflowSettings::default(),
            index: IndexSettings::default(),
            web_search: WebSearchSettings::default(),
            log_level: None,
            log_format: "text".to_string(),
            verbose: false,
            no_color: false,
            llm: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `ARAG_WORKSPACE`: Override workspace path
    /// - `ARAG_CONFIG`: Path to config file
    /// - `ARAG_PROVIDER`: LLM provider
    /// - `ARAG_CHAT_MODEL`: Answer generation model
    /// - `ARAG_RAG_MODEL`: Routing and grading model
    /// - `OLLAMA_URL`: Ollama endpoint
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use arag_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("ARAG_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("ARAG_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.arag_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("ARAG_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("ARAG_CHAT_MODEL") {
            config.chat_model = model;
        }

        if let Ok(model) = std::env::var("ARAG_RAG_MODEL") {
            config.rag_model = model;
        }

        if let Ok(endpoint) = std::env::var("OLLAMA_URL") {
            config.endpoint = endpoint;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(workflow) = config_file.workflow {
            result.workflow = workflow;
        }

        if let Some(index) = config_file.index {
            result.index = index;
        }

        if let Some(web_search) = config_file.web_search {
            result.web_search = web_search;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.endpoint = provider_config.endpoint.clone();
                if let Some(ref model) = provider_config.chat_model {
                    result.chat_model = model.clone();
                }
                if let Some(ref model) = provider_config.rag_model {
                    result.rag_model = model.clone();
                }
                if let Some(ref model) = provider_config.embedding_model {
                    result.index.embedding_model = model.clone();
                }
                if let Some(timeout) = provider_config.timeout {
                    result.request_timeout_secs = timeout;
                }
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// This method merges command-line flags with the loaded configuration,
    /// giving precedence to CLI flags over environment variables.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        chat_model: Option<String>,
        rag_model: Option<String>,
        log_level: Option<String>,
        log_format: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = chat_model {
            self.chat_model = model;
        }

        if let Some(model) = rag_model {
            self.rag_model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if let Some(log_format) = log_format {
            self.log_format = log_format;
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .arag directory.
    pub fn arag_dir(&self) -> PathBuf {
        self.workspace.join(".arag")
    }

    /// Ensure the .arag directory exists.
    pub fn ensure_arag_dir(&self) -> AppResult<()> {
        let dir = self.arag_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .arag directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// SQLite database backing the evidence index.
    pub fn index_path(&self) -> PathBuf {
        self.arag_dir().join("index.sqlite")
    }

    /// SQLite database backing conversation history.
    pub fn history_path(&self) -> PathBuf {
        self.arag_dir().join("history.sqlite")
    }

    /// Resolve the web search API key from its environment variable.
    pub fn resolve_web_api_key(&self) -> Option<String> {
        std::env::var(&self.web_search.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.index.embedding_provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.index.embedding_provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.workflow.max_hops == 0 {
            return Err(AppError::Config(
                "workflow.maxHops must be at least 1".to_string(),
            ));
        }

        if self.index.chunk_tokens == 0 {
            return Err(AppError::Config(
                "index.chunkTokens must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
