//! Answer generation.

use arag_core::{AppError, AppResult};
use arag_knowledge::EvidenceChunk;
use arag_prompt::library;

use crate::grading::format_evidence;
use crate::prompting::PromptRunner;
use crate::state::{Answer, Message};

/// Draft an answer from the question, evidence, and recent history.
///
/// The evidence block is empty on the direct path. The last `history_turns`
/// messages are shown to the model.
pub async fn generate_answer(
    runner: &PromptRunner,
    question: &str,
    evidence: &[EvidenceChunk],
    history: &[Message],
    history_turns: usize,
) -> AppResult<Answer> {
    let context = format_evidence(evidence);
    let history = format_history(history, history_turns);

    let raw = runner
        .text(
            library::GENERATE,
            &[
                ("question", question),
                ("context", context.as_str()),
                ("history", history.as_str()),
            ],
        )
        .await?;

    let text = strip_reasoning(&raw);
    if text.is_empty() {
        return Err(AppError::Generation(
            "Model returned an empty answer".to_string(),
        ));
    }

    Ok(Answer::new(text))
}

/// Render the tail of the conversation as `role: content` lines.
pub fn format_history(history: &[Message], turns: usize) -> String {
    let start = history.len().saturating_sub(turns);
    history[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove `<think>...</think>` blocks emitted by reasoning models.
///
/// An unterminated block drops everything after its opening tag.
pub fn strip_reasoning(text: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        match rest[start..].find(CLOSE) {
            Some(end) => rest = &rest[start + end + CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_reasoning() {
        assert_eq!(
            strip_reasoning("<think>\nLet me see.\n</think>\n\nWhales live in the ocean."),
            "Whales live in the ocean."
        );
        assert_eq!(strip_reasoning("No reasoning here."), "No reasoning here.");
        assert_eq!(strip_reasoning("a <think>x</think>b<think>y</think> c"), "a b c");
        assert_eq!(strip_reasoning("answer <think>never closed"), "answer");
    }

    #[test]
    fn test_format_history_keeps_tail() {
        let history = vec![
            Message::user("one"),
            Message::assistant("two"),
            Message::user("three"),
        ];
        assert_eq!(format_history(&history, 2), "assistant: two\nuser: three");
        assert_eq!(format_history(&history, 10).lines().count(), 3);
        assert_eq!(format_history(&history, 0), "");
    }
}
