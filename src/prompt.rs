//! Builds the model-facing system prompt: the tool catalogue plus the
//! behavioral guidelines and the strict JSON response format. Rendered once
//! per run; the catalogue is fixed for the run's duration.

use crate::registry::ToolDefinition;

pub fn build_system_prompt(definitions: &[ToolDefinition]) -> String {
    let catalogue = definitions
        .iter()
        .map(|def| format!("{}: {} Params: {}", def.name, def.description, def.parameters))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are tern, an intelligent CLI coding assistant.
You have access to the following tools:
{catalogue}

IMPORTANT GUIDELINES:
1. For general questions, explanations, or code snippets that don't need to be saved, use "finalAnswer".
2. Do NOT use "write_file" unless the user explicitly asks to save a file or implies a persistent change.
3. If the user asks for example code, just show it in the explanation (finalAnswer). Do NOT create a file for it.
4. Be concise and helpful.

Format your response exactly as a JSON object:
{{
  "thought": "your reasoning",
  "toolCall": {{ "name": "tool_name", "arguments": {{ ... }} }}
}}
OR if you are done/replying:
{{
  "thought": "reasoning",
  "finalAnswer": "your response/code/explanation"
}}
"#
    )
}
