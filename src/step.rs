use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One iteration of the agent loop: the model's reasoning plus at most one
/// meaningful action (a tool call or a final answer).
///
/// When a parsed object carries both `tool_call` and `final_answer`, the
/// final answer wins and the tool call is never executed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default)]
    pub thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
}

/// A named action with arguments, requested by the model.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default = "empty_args")]
    pub arguments: Value,
}

fn empty_args() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Step {
    /// A step carrying only a final answer, used when the parser has to
    /// synthesize one from unstructured text.
    pub fn final_answer(thought: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            final_answer: Some(answer.into()),
            ..Self::default()
        }
    }
}
