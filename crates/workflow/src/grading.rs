//! Binary graders: chunk relevance, answer groundedness, answer usefulness.
//!
//! Any score other than a clear "yes" counts as "no", so an unreadable
//! verdict always leads to more self-correction rather than acceptance.

use arag_core::AppResult;
use arag_knowledge::EvidenceChunk;
use arag_llm::{extract_string, JsonObject};
use arag_prompt::library;
use tracing::{debug, warn};

use crate::prompting::PromptRunner;
use crate::state::GenerationGrade;

/// Read a binary `score` verdict.
pub fn is_yes(map: &JsonObject) -> bool {
    match extract_string(map, "score").map(|s| s.to_lowercase()) {
        Some(score) if score == "yes" || score == "true" => true,
        Some(score) if score == "no" || score == "false" => false,
        other => {
            warn!("Unrecognised grader score {:?}, treating as 'no'", other);
            false
        }
    }
}

/// Keep the chunks graded relevant, in retrieval order.
///
/// Chunks are graded one at a time.
pub async fn filter_relevant(
    runner: &PromptRunner,
    question: &str,
    chunks: Vec<EvidenceChunk>,
) -> AppResult<Vec<EvidenceChunk>> {
    let mut relevant = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let map = runner
            .json(
                library::GRADE_RELEVANCE,
                &[("question", question), ("document", chunk.text.as_str())],
            )
            .await?;

        if is_yes(&map) {
            debug!("---GRADE: DOCUMENT RELEVANT---");
            relevant.push(chunk);
        } else {
            debug!("---GRADE: DOCUMENT NOT RELEVANT---");
        }
    }
    Ok(relevant)
}

/// Is the answer supported by the evidence block?
pub async fn is_grounded(runner: &PromptRunner, documents: &str, answer: &str) -> AppResult<bool> {
    let map = runner
        .json(
            library::GRADE_GROUNDED,
            &[("documents", documents), ("generation", answer)],
        )
        .await?;
    Ok(is_yes(&map))
}

/// Does the answer resolve the question?
pub async fn is_useful(runner: &PromptRunner, question: &str, answer: &str) -> AppResult<bool> {
    let map = runner
        .json(
            library::GRADE_USEFUL,
            &[("question", question), ("generation", answer)],
        )
        .await?;
    Ok(is_yes(&map))
}

/// Run both self-critique graders on a draft.
///
/// Without evidence the graders are skipped and the draft is accepted.
/// That leaves direct answers unchecked for usefulness.
pub async fn grade_generation(
    runner: &PromptRunner,
    question: &str,
    evidence: &[EvidenceChunk],
    answer: &str,
) -> AppResult<GenerationGrade> {
    if evidence.is_empty() {
        debug!("No evidence, skipping self-critique");
        return Ok(GenerationGrade::Unchecked);
    }

    let documents = format_evidence(evidence);
    if !is_grounded(runner, &documents, answer).await? {
        tracing::info!("---DECISION: GENERATION IS NOT GROUNDED IN DOCUMENTS, RE-TRY---");
        return Ok(GenerationGrade::NotSupported);
    }

    if is_useful(runner, question, answer).await? {
        tracing::info!("---DECISION: GENERATION ADDRESSES QUESTION---");
        Ok(GenerationGrade::Useful)
    } else {
        tracing::info!("---DECISION: GENERATION DOES NOT ADDRESS QUESTION---");
        Ok(GenerationGrade::NotUseful)
    }
}

/// Evidence block shared by the generator and the groundedness grader.
pub fn format_evidence(evidence: &[EvidenceChunk]) -> String {
    evidence
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
