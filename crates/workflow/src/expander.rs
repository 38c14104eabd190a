//! Query expansion: multi-query retrieval and rewrite-on-failure.

use std::collections::HashSet;

use arag_core::{AppError, AppResult};
use arag_knowledge::{EvidenceChunk, EvidenceStore};
use arag_llm::{extract_string, extract_string_list};
use arag_prompt::library;
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::prompting::PromptRunner;

/// Generate up to `count` paraphrases of `question`.
///
/// The original question always comes first; paraphrases identical to it
/// or to each other are dropped.
pub async fn expand_question(
    runner: &PromptRunner,
    question: &str,
    count: usize,
) -> AppResult<Vec<String>> {
    let mut queries = vec![question.to_string()];
    if count == 0 {
        return Ok(queries);
    }

    let count_text = count.to_string();
    let map = runner
        .json(
            library::EXPAND,
            &[("question", question), ("count", count_text.as_str())],
        )
        .await?;

    let mut seen: HashSet<String> = HashSet::from([normalize(question)]);
    for paraphrase in extract_string_list(&map, "queries") {
        if queries.len() > count {
            break;
        }
        if seen.insert(normalize(&paraphrase)) {
            queries.push(paraphrase);
        }
    }

    debug!("Expanded question into {} queries: {:?}", queries.len(), queries);
    Ok(queries)
}

/// Run every query against the store concurrently and union the results.
///
/// Results keep first-seen order across queries. If any query fails the
/// whole retrieval fails.
pub async fn retrieve_union(
    store: &EvidenceStore,
    queries: &[String],
    top_k: usize,
) -> AppResult<Vec<EvidenceChunk>> {
    let batches = try_join_all(queries.iter().map(|q| store.query(q, top_k))).await?;

    let mut seen = HashSet::new();
    let union: Vec<EvidenceChunk> = batches
        .into_iter()
        .flatten()
        .filter(|chunk| seen.insert(chunk.clone()))
        .collect();

    info!(
        "Retrieved {} unique chunks from {} queries",
        union.len(),
        queries.len()
    );
    Ok(union)
}

/// Produce one improved question that differs from `question`.
///
/// The structured reply is read by key when present, else by its single
/// value. A reply equal to the input is re-asked; after `max_attempts`
/// identical replies the rewrite fails.
pub async fn rewrite_question(
    runner: &PromptRunner,
    question: &str,
    max_attempts: u32,
) -> AppResult<String> {
    let attempts = max_attempts.max(1);
    for attempt in 1..=attempts {
        let map = runner
            .json(library::REWRITE, &[("question", question)])
            .await?;

        match extract_string(&map, "question") {
            Some(rewritten) if !rewritten.is_empty() && normalize(&rewritten) != normalize(question) => {
                info!("Rewrote question: {:?} -> {:?}", question, rewritten);
                return Ok(rewritten);
            }
            other => {
                warn!(
                    "Rewrite attempt {}/{} produced no new question: {:?}",
                    attempt, attempts, other
                );
            }
        }
    }

    Err(AppError::Generation(format!(
        "Could not rewrite question after {} attempts: {}",
        attempts, question
    )))
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
