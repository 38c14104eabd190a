//! Prompt system for the adaptive RAG assistant.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions
//! - Handlebars template rendering
//! - A built-in library covering every workflow node
//! - Workspace overrides under `.arag/prompts/`

pub mod builder;
pub mod library;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use library::PromptLibrary;
pub use loader::{list_prompts, load_prompt};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, ModelRole, OutputFormat, PromptBehavior, PromptDefinition,
};
