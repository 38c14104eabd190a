//! Structured (JSON) output handling.
//!
//! Models asked for JSON do not reliably honour the requested key name, and
//! some wrap the object in code fences or prose. The helpers here parse the
//! first JSON object out of a completion into an untyped map and read values
//! with an explicit fallback: the expected key if present, otherwise the
//! single value the model did return, otherwise the one key that contains
//! the expected name.

use arag_core::{AppError, AppResult};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::client::{LlmClient, LlmRequest};
use crate::types::ResponseFormat;

/// Untyped JSON object returned by a structured completion.
pub type JsonObject = Map<String, Value>;

/// Appended to the prompt when a previous attempt was not valid JSON.
const REASK_SUFFIX: &str =
    "\n\nYour previous reply was not valid JSON. Respond with a single JSON object and nothing else.";

/// Parse a JSON object out of a model completion.
///
/// Accepts bare objects, objects inside Markdown code fences, and objects
/// surrounded by prose.
pub fn parse_json_object(text: &str) -> AppResult<JsonObject> {
    let trimmed = strip_code_fence(text.trim());

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(map);
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return Ok(map);
            }
        }
    }

    Err(AppError::Serialization(format!(
        "Expected a JSON object, got: {}",
        preview(text)
    )))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(120).collect();
    if text.chars().count() > 120 {
        preview.push_str("...");
    }
    preview
}

/// Read `key` from a structured response when the model used a different
/// key name.
///
/// A lone value is taken as is. With several keys only a single key
/// containing `key` (case-insensitive) is accepted; anything else is
/// unreadable.
pub fn extract_value<'a>(map: &'a JsonObject, key: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }

    if map.len() == 1 {
        let (actual_key, value) = map.iter().next()?;
        debug!(
            expected = key,
            actual = %actual_key,
            "Structured output used an unexpected key, taking its only value"
        );
        return Some(value);
    }

    let needle = key.to_lowercase();
    let mut candidates = map
        .iter()
        .filter(|(actual_key, _)| actual_key.to_lowercase().contains(&needle));

    match (candidates.next(), candidates.next()) {
        (Some((actual_key, value)), None) => {
            debug!(
                expected = key,
                actual = %actual_key,
                "Structured output used a longer key name"
            );
            Some(value)
        }
        _ => {
            if !map.is_empty() {
                warn!(
                    expected = key,
                    keys = ?map.keys().collect::<Vec<_>>(),
                    "Structured output has no unambiguous value for the expected key"
                );
            }
            None
        }
    }
}

/// Read a scalar as a trimmed string.
pub fn extract_string(map: &JsonObject, key: &str) -> Option<String> {
    match extract_value(map, key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a list of strings.
///
/// A single string is split on newlines so that models answering with a
/// numbered block instead of an array still yield usable items.
pub fn extract_string_list(map: &JsonObject, key: &str) -> Vec<String> {
    let items: Vec<String> = match extract_value(map, key) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s.lines().map(str::to_string).collect(),
        _ => Vec::new(),
    };

    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Run a JSON-mode completion and parse the result.
///
/// Malformed output is re-asked up to `max_parse_attempts` times in total;
/// after that the call fails with `AppError::Llm`.
pub async fn complete_json(
    client: &dyn LlmClient,
    request: &LlmRequest,
    max_parse_attempts: u32,
) -> AppResult<JsonObject> {
    let attempts = max_parse_attempts.max(1);
    let mut request = request.clone().with_format(ResponseFormat::Json);
    let base_prompt = request.prompt.clone();
    let mut last_error = None;

    for attempt in 1..=attempts {
        let response = client.complete(&request).await?;
        match parse_json_object(&response.content) {
            Ok(map) => return Ok(map),
            Err(e) => {
                warn!(
                    "Malformed structured output (attempt {}/{}): {}",
                    attempt, attempts, e
                );
                last_error = Some(e);
                request.prompt = format!("{}{}", base_prompt, REASK_SUFFIX);
            }
        }
    }

    Err(AppError::Llm(format!(
        "Model returned malformed JSON after {} attempts: {}",
        attempts,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LlmResponse;
    use serde_json::json;
    use std::sync::Mutex;

    fn object(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_parse_bare_object() {
        let map = parse_json_object(r#"{"score": "yes"}"#).unwrap();
        assert_eq!(map["score"], json!("yes"));
    }

    #[test]
    fn test_parse_fenced_object() {
        let text = "```json\n{\"datasource\": \"vectorstore\"}\n```";
        let map = parse_json_object(text).unwrap();
        assert_eq!(map["datasource"], json!("vectorstore"));
    }

    #[test]
    fn test_parse_object_in_prose() {
        let text = "Sure! Here is the result: {\"score\": \"no\"} Hope that helps.";
        let map = parse_json_object(text).unwrap();
        assert_eq!(map["score"], json!("no"));
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(parse_json_object("yes").is_err());
        assert!(parse_json_object("[\"yes\"]").is_err());
        assert!(parse_json_object("{not json}").is_err());
    }

    #[test]
    fn test_extract_expected_key() {
        let map = object(json!({"question": "what is a whale", "other": "x"}));
        assert_eq!(
            extract_string(&map, "question").as_deref(),
            Some("what is a whale")
        );
    }

    #[test]
    fn test_extract_falls_back_to_single_value() {
        let map = object(json!({"improved_question": "  define whale  "}));
        assert_eq!(
            extract_string(&map, "question").as_deref(),
            Some("define whale")
        );
    }

    #[test]
    fn test_extract_ignores_unrelated_keys_among_several() {
        let map = object(json!({
            "improved": "Describe the whale",
            "explanation": "Made the question more specific"
        }));
        assert!(extract_value(&map, "question").is_none());
        assert!(extract_string(&map, "question").is_none());
    }

    #[test]
    fn test_extract_prefers_key_naming_the_expected_one() {
        let map = object(json!({
            "explanation": "Made the question more specific",
            "improved_question": "Describe the whale"
        }));
        assert_eq!(
            extract_string(&map, "question").as_deref(),
            Some("Describe the whale")
        );

        let ambiguous = object(json!({"question_a": "one", "question_b": "two"}));
        assert!(extract_value(&ambiguous, "question").is_none());
    }

    #[test]
    fn test_extract_from_empty_object() {
        let map = JsonObject::new();
        assert!(extract_value(&map, "score").is_none());
        assert!(extract_string_list(&map, "topics").is_empty());
    }

    #[test]
    fn test_extract_string_list_variants() {
        let map = object(json!({"topics": ["Whales", " ", "oceans"]}));
        assert_eq!(extract_string_list(&map, "topics"), vec!["Whales", "oceans"]);

        let map = object(json!({"queries": "first\nsecond\n"}));
        assert_eq!(extract_string_list(&map, "anything"), vec!["first", "second"]);
    }

    /// Replays canned completions in order.
    struct CannedClient {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedClient {
        fn new(replies: &[&str]) -> Self {
            let mut replies: Vec<String> = replies.iter().map(|s| s.to_string()).collect();
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for CannedClient {
        fn provider_name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            assert_eq!(request.format, ResponseFormat::Json);
            self.prompts.lock().unwrap().push(request.prompt.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "garbage".to_string());
            Ok(LlmResponse::text(reply, request.model.clone()))
        }
    }

    #[tokio::test]
    async fn test_complete_json_reasks_once() {
        let client = CannedClient::new(&["not json at all", r#"{"score": "yes"}"#]);
        let request = LlmRequest::new("Grade this", "mistral");

        let map = complete_json(&client, &request, 2).await.unwrap();

        assert_eq!(map["score"], json!("yes"));
        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], "Grade this");
        assert!(prompts[1].starts_with("Grade this"));
        assert!(prompts[1].contains("not valid JSON"));
    }

    #[tokio::test]
    async fn test_complete_json_is_bounded() {
        let client = CannedClient::new(&["nope", "still nope", "never reached"]);
        let request = LlmRequest::new("Grade this", "mistral");

        let result = complete_json(&client, &request, 2).await;

        assert!(matches!(result, Err(AppError::Llm(_))));
        assert_eq!(client.prompts.lock().unwrap().len(), 2);
    }
}
