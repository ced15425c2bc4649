//! Recovers a structured [`Step`] from raw model output.
//!
//! Models rarely emit clean JSON on the first try, so parsing is a fixed
//! priority list of strategies; the first one that produces a step wins.

use crate::step::Step;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// How much of the offending text is kept for diagnostics.
const ERROR_PREFIX_LEN: usize = 100;

#[derive(Debug, Error)]
#[error("unable to parse model response (starts with: {prefix:?})")]
pub struct ParseError {
    pub prefix: String,
}

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    // First fenced block, with or without a language label.
    Regex::new(r"(?s)```[a-zA-Z]*\n?(.*?)```").expect("fenced block regex")
});

/// Parses raw model text into a [`Step`].
///
/// Strategy order:
/// 1. body of the first fenced code block
/// 2. widest substring from the first `{` to the last `}`
/// 3. the entire text verbatim
/// 4. completion-marker scan ("done" / "completed") synthesizing a final answer
pub fn parse(text: &str) -> Result<Step, ParseError> {
    let strategies: [fn(&str) -> Option<Step>; 4] = [
        parse_fenced_block,
        parse_brace_window,
        parse_verbatim,
        parse_completion_marker,
    ];

    for strategy in strategies {
        if let Some(step) = strategy(text) {
            return Ok(step);
        }
    }

    Err(ParseError {
        prefix: truncate(text, ERROR_PREFIX_LEN),
    })
}

fn parse_step_json(candidate: &str) -> Option<Step> {
    let value: serde_json::Value = serde_json::from_str(candidate.trim()).ok()?;
    // A bare string or array is valid JSON but not a step.
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn parse_fenced_block(text: &str) -> Option<Step> {
    let captures = FENCED_BLOCK.captures(text)?;
    parse_step_json(captures.get(1)?.as_str())
}

fn parse_brace_window(text: &str) -> Option<Step> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_step_json(&text[start..=end])
}

fn parse_verbatim(text: &str) -> Option<Step> {
    parse_step_json(text)
}

fn parse_completion_marker(text: &str) -> Option<Step> {
    let lowered = text.to_lowercase();
    if lowered.contains("done") || lowered.contains("completed") {
        // The raw text becomes the answer; nothing more structured exists.
        Some(Step::final_answer("Detected completion marker.", text))
    } else {
        None
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_fenced_json_with_tool_call() {
        let text = r#"Here is my plan.
```json
{
  "thought": "I should read the file first.",
  "toolCall": { "name": "read_file", "arguments": { "path": "src/main.rs" } }
}
```"#;
        let step = parse(text).unwrap();
        assert_eq!(step.thought, "I should read the file first.");
        let call = step.tool_call.unwrap();
        assert_eq!(call.name, "read_file");
        assert_eq!(call.arguments, json!({ "path": "src/main.rs" }));
        assert!(step.final_answer.is_none());
    }

    #[test]
    fn test_parses_unlabelled_fence_with_final_answer() {
        let text = "```\n{\"thought\": \"ok\", \"finalAnswer\": \"All set.\"}\n```";
        let step = parse(text).unwrap();
        assert_eq!(step.final_answer.as_deref(), Some("All set."));
        assert!(step.tool_call.is_none());
    }

    #[test]
    fn test_both_fields_are_preserved_for_precedence() {
        // The orchestrator prefers finalAnswer; the parser keeps both.
        let text = r#"{"thought": "t", "finalAnswer": "a", "toolCall": {"name": "x", "arguments": {}}}"#;
        let step = parse(text).unwrap();
        assert!(step.final_answer.is_some());
        assert!(step.tool_call.is_some());
    }

    #[test]
    fn test_brace_window_fallback() {
        let text = "Sure! {\"thought\": \"hi\", \"finalAnswer\": \"42\"} hope that helps";
        let step = parse(text).unwrap();
        assert_eq!(step.final_answer.as_deref(), Some("42"));
    }

    #[test]
    fn test_bare_json_verbatim() {
        let text = "{\"thought\": \"direct\", \"finalAnswer\": \"done deal\"}";
        let step = parse(text).unwrap();
        assert_eq!(step.thought, "direct");
    }

    #[test]
    fn test_completion_marker_synthesizes_final_answer() {
        let text = "I think we are DONE here, everything works.";
        let step = parse(text).unwrap();
        assert_eq!(step.final_answer.as_deref(), Some(text));
        assert!(step.tool_call.is_none());
    }

    #[test]
    fn test_completed_marker_case_insensitive() {
        let text = "Task Completed without issues";
        let step = parse(text).unwrap();
        assert_eq!(step.final_answer.as_deref(), Some(text));
    }

    #[test]
    fn test_unparseable_text_yields_truncated_prefix() {
        let text = "x".repeat(500);
        let err = parse(&text).unwrap_err();
        assert_eq!(err.prefix.chars().count(), 100);
        assert!(text.starts_with(&err.prefix));
    }

    #[test]
    fn test_json_array_is_not_a_step() {
        let err = parse("[1, 2, 3]").unwrap_err();
        assert!(err.prefix.starts_with("[1"));
    }

    #[test]
    fn test_fenced_block_takes_priority_over_brace_window() {
        let text = "{\"thought\": \"outer\"} ```json\n{\"thought\": \"inner\", \"finalAnswer\": \"a\"}\n```";
        // The fenced block is tried first even though a brace window exists
        // earlier in the text.
        let step = parse(text).unwrap();
        assert_eq!(step.thought, "inner");
    }
}
