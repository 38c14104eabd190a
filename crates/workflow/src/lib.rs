//! Adaptive retrieval-and-generation control loop.
//!
//! A question is routed to the local evidence store, the web, or straight
//! to the generator. Retrieved evidence is filtered for relevance, the
//! draft answer is graded for groundedness and usefulness, and the loop
//! regenerates or rewrites the question until the answer is accepted or
//! the hop ceiling is reached.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use arag_core::AppConfig;
//! use arag_workflow::{ModelNames, PromptRunner, WorkflowEngine};
//!
//! # async fn example() -> arag_core::AppResult<()> {
//! let config = AppConfig::load()?;
//! let llm = arag_llm::client_from_config(&config)?;
//! let prompts = Arc::new(arag_prompt::PromptLibrary::load(&config.workspace)?);
//! let store = arag_knowledge::open_store(&config, llm.clone(), prompts.clone()).await?;
//!
//! let runner = PromptRunner::new(
//!     llm,
//!     prompts,
//!     ModelNames::from_config(&config),
//!     config.workflow.max_parse_attempts,
//! );
//! let engine = WorkflowEngine::new(runner, Arc::new(store), config.workflow.clone());
//! let outcome = engine.run("What is a whale?", Vec::new()).await?;
//! println!("{}", outcome.answer.text);
//! # Ok(())
//! # }
//! ```

pub mod edges;
pub mod engine;
pub mod expander;
pub mod generator;
pub mod grading;
pub mod node;
pub mod prompting;
pub mod router;
pub mod state;

#[cfg(test)]
mod tests;

pub use engine::{Step, Termination, WorkflowEngine, WorkflowEvent, WorkflowOutcome};
pub use node::{Node, Transition};
pub use prompting::{ModelNames, PromptRunner};
pub use state::{Answer, GenerationGrade, Message, Role, Route, StateUpdate, WorkflowState};
