//! # Agent Orchestrator
//!
//! Drives the bounded step loop: compose context, call the model, parse a
//! [`Step`], dispatch the tool call (if any), fold the result into the next
//! prompt. Owns the append-only history and decides termination.

use crate::llm::{ChatMessage, LlmClient};
use crate::parser;
use crate::prompt;
use crate::registry::ToolRegistry;
use crate::step::Step;
use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Returned when the model never produces a final answer within the budget.
pub const STEP_LIMIT_SENTINEL: &str = "Max steps reached.";
/// Returned when the cooperative pause flag stops the run between steps.
pub const PAUSED_SENTINEL: &str = "Paused.";

pub struct Agent {
    client: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    system_prompt: String,
    max_steps: usize,
    pause: Arc<AtomicBool>,
    /// Append-only log of steps for the run, shared with the session.
    pub history: Vec<Step>,
}

impl Agent {
    pub fn new(client: Arc<dyn LlmClient>, registry: Arc<ToolRegistry>, max_steps: usize) -> Self {
        let system_prompt = prompt::build_system_prompt(&registry.get_definitions());
        Self {
            client,
            registry,
            system_prompt,
            max_steps,
            pause: Arc::new(AtomicBool::new(false)),
            history: Vec::new(),
        }
    }

    /// Cooperative pause flag, checked once per loop iteration. Setting it
    /// does not interrupt an in-flight model call or tool execution; it only
    /// prevents acting on the next step.
    pub fn pause_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.pause)
    }

    /// Runs the loop until a final answer, the step budget, or the pause
    /// flag ends it. Each step is sent to `events` as soon as it is parsed.
    ///
    /// Tool failures, unknown tool names, and parse failures are folded back
    /// into the conversation as text; only transport faults escape as errors.
    pub async fn run(
        &mut self,
        prompt: &str,
        prior: &[ChatMessage],
        events: &mpsc::UnboundedSender<Step>,
    ) -> Result<String> {
        let mut current_prompt = prompt.to_string();

        for _ in 0..self.max_steps {
            if self.pause.load(Ordering::SeqCst) {
                return Ok(PAUSED_SENTINEL.to_string());
            }

            let mut messages = Vec::with_capacity(prior.len() + 2);
            messages.push(ChatMessage::system(self.system_prompt.clone()));
            messages.extend_from_slice(prior);
            messages.push(ChatMessage::user(current_prompt.clone()));

            // Streaming fragments are coalesced inside chat(); the parser
            // never sees a partial step.
            let response = self.client.chat(messages).await?;

            let step = match parser::parse(&response) {
                Ok(step) => step,
                Err(e) => {
                    // Recovered locally: emit a diagnostic step and retry
                    // with the same prompt. Still consumes one budget unit.
                    let retry = Step {
                        thought: "Failed to parse model response. Retrying...".to_string(),
                        tool_output: Some(format!("Error: {e}")),
                        ..Step::default()
                    };
                    let _ = events.send(retry);
                    continue;
                }
            };

            let _ = events.send(step.clone());
            self.history.push(step);
            let step = self.history.last_mut().expect("step was just pushed");

            // finalAnswer wins when the model emits both.
            if let Some(answer) = step.final_answer.clone() {
                return Ok(answer);
            }

            if let Some(call) = step.tool_call.clone() {
                let output = match self.registry.execute(&call.name, call.arguments).await {
                    Ok(output) => output,
                    Err(not_found) => not_found.to_string(),
                };
                current_prompt = format!("Tool '{}' returned: {}", call.name, output);
                step.tool_output = Some(output);
            }
            // A step with neither field keeps the loop going with the same
            // prompt so the model can try again.
        }

        Ok(STEP_LIMIT_SENTINEL.to_string())
    }
}
