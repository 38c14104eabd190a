//! Render a library prompt and send it to the model its behavior names.

use std::sync::Arc;

use arag_core::{AppConfig, AppResult};
use arag_llm::{complete_json, JsonObject, LlmClient, LlmRequest, ResponseFormat};
use arag_prompt::{BuiltPrompt, ModelRole, OutputFormat, PromptLibrary};
use tracing::debug;

/// Model names for the two prompt roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelNames {
    /// Conversational answers
    pub chat: String,
    /// Routing, grading, rewriting
    pub rag: String,
}

impl ModelNames {
    pub fn new(chat: impl Into<String>, rag: impl Into<String>) -> Self {
        Self {
            chat: chat.into(),
            rag: rag.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.chat_model.clone(), config.rag_model.clone())
    }

    fn for_role(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Chat => &self.chat,
            ModelRole::Rag => &self.rag,
        }
    }
}

/// Shared access to the model and the prompt library for every node.
pub struct PromptRunner {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    models: ModelNames,
    max_parse_attempts: u32,
}

impl PromptRunner {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        models: ModelNames,
        max_parse_attempts: u32,
    ) -> Self {
        Self {
            llm,
            prompts,
            models,
            max_parse_attempts,
        }
    }

    fn request(&self, built: BuiltPrompt) -> LlmRequest {
        let format = match built.behavior.format {
            OutputFormat::Json => ResponseFormat::Json,
            OutputFormat::Text => ResponseFormat::Text,
        };
        let model = self.models.for_role(built.behavior.model);

        debug!(
            prompt = %built.metadata.source_prompt_id,
            model,
            "Sending prompt"
        );

        let mut request = LlmRequest::new(built.user, model)
            .with_temperature(built.behavior.temperature)
            .with_format(format);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        request
    }

    /// Ask for a structured answer; malformed output is re-asked a bounded
    /// number of times.
    pub async fn json(&self, prompt_id: &str, variables: &[(&str, &str)]) -> AppResult<JsonObject> {
        let built = self.prompts.render(prompt_id, variables)?;
        let request = self.request(built).with_json();
        complete_json(self.llm.as_ref(), &request, self.max_parse_attempts).await
    }

    /// Ask for free text.
    pub async fn text(&self, prompt_id: &str, variables: &[(&str, &str)]) -> AppResult<String> {
        let built = self.prompts.render(prompt_id, variables)?;
        let request = self.request(built);
        let response = self.llm.complete(&request).await?;
        Ok(response.content)
    }
}
