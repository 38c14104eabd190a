//! Ask command handler.
//!
//! Runs the adaptive workflow for one question, optionally inside a stored
//! conversation.

use std::io::Write;
use std::sync::Arc;

use arag_core::{config::AppConfig, AppError, AppResult};
use arag_history::{history_for, ConversationId, ConversationStore, SqliteConversationStore};
use arag_knowledge::TavilySearcher;
use arag_workflow::{
    Message, ModelNames, PromptRunner, Role, WorkflowEngine, WorkflowEvent, WorkflowOutcome,
};
use clap::Args;
use futures::{pin_mut, StreamExt};

use super::{print_json, Services};

/// Ask a question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Conversation to continue; its messages become the history
    #[arg(long)]
    pub conversation: Option<ConversationId>,

    /// Disable progress output
    #[arg(long)]
    pub no_stream: bool,

    /// Output the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let question = self.question.trim();
        if question.is_empty() {
            return Err(AppError::Config("No question provided".to_string()));
        }

        let services = Services::open(config).await?;
        let engine = build_engine(config, services);

        let conversation = match self.conversation {
            Some(id) => {
                let store = SqliteConversationStore::open(config.history_path()).await?;
                let conversation = store.get(id).await?;
                Some((store, conversation))
            }
            None => None,
        };
        let history = conversation
            .as_ref()
            .map(|(_, c)| history_for(c))
            .unwrap_or_default();
        tracing::debug!(turns = history.len(), "Loaded conversation history");

        let result = if self.no_stream || self.json {
            engine.run(question, history).await
        } else {
            self.run_with_progress(&engine, question, history).await
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e @ AppError::Generation(_)) => {
                eprintln!("Error: could not generate an answer");
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            route = outcome.route.as_str(),
            hops = outcome.hops,
            termination = ?outcome.termination,
            "Workflow finished"
        );

        if let Some((store, conversation)) = &conversation {
            store
                .append_message(conversation.id, Role::User, question, &[])
                .await?;
            store
                .append_message(
                    conversation.id,
                    Role::Assistant,
                    &outcome.answer.text,
                    &outcome.evidence,
                )
                .await?;
        }

        if self.json {
            print_json(&outcome)
        } else {
            print_outcome(&outcome);
            Ok(())
        }
    }

    async fn run_with_progress(
        &self,
        engine: &WorkflowEngine,
        question: &str,
        history: Vec<Message>,
    ) -> AppResult<WorkflowOutcome> {
        let events = engine.run_streaming(question, history);
        pin_mut!(events);

        while let Some(event) = events.next().await {
            match event? {
                WorkflowEvent::Progress { status, .. } => {
                    eprintln!("{}", status);
                    std::io::stderr().flush().ok();
                }
                WorkflowEvent::Finished(outcome) => return Ok(outcome),
            }
        }

        Err(AppError::Generation(
            "Workflow ended without an answer".to_string(),
        ))
    }
}

fn build_engine(config: &AppConfig, services: Services) -> WorkflowEngine {
    let runner = PromptRunner::new(
        services.llm,
        services.prompts,
        ModelNames::from_config(config),
        config.workflow.max_parse_attempts,
    );
    let engine = WorkflowEngine::new(runner, services.store, config.workflow.clone());

    match TavilySearcher::from_settings(&config.web_search, config.resolve_web_api_key()) {
        Ok(searcher) => {
            engine.with_web_search(Arc::new(searcher), config.web_search.max_results as usize)
        }
        Err(e) => {
            tracing::warn!("Web search disabled: {}", e);
            engine
        }
    }
}

fn print_outcome(outcome: &WorkflowOutcome) {
    println!("{}", outcome.answer.text);

    if outcome.evidence.is_empty() {
        return;
    }

    println!();
    println!("Sources:");
    for chunk in &outcome.evidence {
        match &chunk.provenance {
            Some(source) => println!("- {}", source),
            None => println!("- web search"),
        }
    }
}
