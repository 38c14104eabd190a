//! Prompt library: built-in definitions plus workspace overrides.
//!
//! Every model-facing instruction used by the workflow ships with the
//! crate. A workspace replaces any of them by dropping
//! `.arag/prompts/<id>.yml`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use arag_core::{AppError, AppResult};

use crate::builder::build_prompt;
use crate::loader::{list_prompts, load_prompt, parse_prompt};
use crate::types::{BuiltPrompt, PromptDefinition};

pub const ROUTER: &str = "router";
pub const GRADE_RELEVANCE: &str = "grade.relevance";
pub const GRADE_GROUNDED: &str = "grade.grounded";
pub const GRADE_USEFUL: &str = "grade.useful";
pub const REWRITE: &str = "rewrite";
pub const EXPAND: &str = "expand";
pub const GENERATE: &str = "generate";
pub const TOPICS: &str = "topics";

const BUILTIN: [(&str, &str); 8] = [
    (ROUTER, include_str!("../prompts/router.yml")),
    (GRADE_RELEVANCE, include_str!("../prompts/grade.relevance.yml")),
    (GRADE_GROUNDED, include_str!("../prompts/grade.grounded.yml")),
    (GRADE_USEFUL, include_str!("../prompts/grade.useful.yml")),
    (REWRITE, include_str!("../prompts/rewrite.yml")),
    (EXPAND, include_str!("../prompts/expand.yml")),
    (GENERATE, include_str!("../prompts/generate.yml")),
    (TOPICS, include_str!("../prompts/topics.yml")),
];

/// Resolved set of prompt definitions, keyed by id.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    prompts: BTreeMap<String, PromptDefinition>,
}

impl PromptLibrary {
    /// Library containing only the built-in definitions.
    pub fn builtin() -> AppResult<Self> {
        let mut prompts = BTreeMap::new();
        for (id, yaml) in BUILTIN {
            let definition = parse_prompt(yaml, &format!("built-in prompt '{}'", id))?;
            prompts.insert(id.to_string(), definition);
        }
        Ok(Self { prompts })
    }

    /// Built-in definitions with any workspace overrides applied.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        let mut library = Self::builtin()?;

        for id in list_prompts(workspace_path)? {
            let definition = load_prompt(workspace_path, &id)?;
            if !library.prompts.contains_key(&id) {
                tracing::warn!("Prompt override '{}' does not replace a built-in prompt", id);
            }
            library.prompts.insert(id, definition);
        }

        Ok(library)
    }

    /// Look up a definition by id.
    pub fn get(&self, id: &str) -> AppResult<&PromptDefinition> {
        self.prompts
            .get(id)
            .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", id)))
    }

    /// Render a prompt with the given variables.
    pub fn render(&self, id: &str, variables: &[(&str, &str)]) -> AppResult<BuiltPrompt> {
        let definition = self.get(id)?;
        let variables: HashMap<String, String> = variables
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        build_prompt(definition, variables)
    }

    /// Ids of every prompt in the library.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.prompts.keys().map(String::as_str)
    }
}
