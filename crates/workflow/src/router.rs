//! Question router.

use arag_core::AppResult;
use arag_llm::extract_string;
use arag_prompt::library;
use tracing::info;

use crate::prompting::PromptRunner;
use crate::state::Route;

/// Shown to the router when nothing has been indexed.
const NO_TOPICS: &str = "(nothing has been indexed yet)";

/// Decide where to look for evidence, from the question alone.
///
/// `topic_hint` is the comma-joined index topic set.
pub async fn route_question(
    runner: &PromptRunner,
    question: &str,
    topic_hint: &str,
) -> AppResult<Route> {
    let topics = if topic_hint.trim().is_empty() {
        NO_TOPICS
    } else {
        topic_hint
    };

    let map = runner
        .json(library::ROUTER, &[("question", question), ("topics", topics)])
        .await?;

    let route = extract_string(&map, "datasource")
        .map(|token| Route::from_token(&token))
        .unwrap_or(Route::Direct);

    info!(route = route.as_str(), "Routed question");
    Ok(route)
}
