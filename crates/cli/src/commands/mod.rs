//! Command handlers for the arag CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod conversation;
pub mod index;
pub mod ingest;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use conversation::ConversationCommand;
pub use index::IndexCommand;
pub use ingest::IngestCommand;

use std::sync::Arc;

use arag_core::{config::AppConfig, AppError, AppResult};
use arag_knowledge::EvidenceStore;
use arag_llm::{client_from_config, LlmClient};
use arag_prompt::PromptLibrary;
use serde::Serialize;

/// Collaborators shared by the commands that touch the index.
pub(crate) struct Services {
    pub llm: Arc<dyn LlmClient>,
    pub prompts: Arc<PromptLibrary>,
    pub store: Arc<EvidenceStore>,
}

impl Services {
    pub async fn open(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let llm = client_from_config(config)?;
        let prompts = Arc::new(PromptLibrary::load(&config.workspace)?);
        let store = arag_knowledge::open_store(config, llm.clone(), prompts.clone()).await?;

        Ok(Self {
            llm,
            prompts,
            store: Arc::new(store),
        })
    }
}

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
