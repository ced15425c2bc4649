//! # Tool Registry
//!
//! The registry is the name -> (schema, executor) contract every other piece
//! depends on. Tools are registered once at session start; the definition
//! snapshot feeds the model-facing catalogue and never changes afterwards.

use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// What the model is told about a tool: its name, a one-paragraph
/// description, and a JSON schema for the arguments.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The callable half of a registered tool.
pub type ToolExecutor = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<String>> + Send + Sync>;

#[derive(Debug, Error)]
#[error("Tool '{name}' not found.")]
pub struct ToolNotFound {
    pub name: String,
}

struct RegisteredTool {
    definition: ToolDefinition,
    executor: ToolExecutor,
}

/// A registry keyed by tool name storing a capability record per tool.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ToolDefinition, executor: ToolExecutor) {
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                executor,
            },
        );
    }

    /// Snapshot of all definitions, sorted by name so the rendered catalogue
    /// is stable across runs.
    pub fn get_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self
            .tools
            .values()
            .map(|tool| tool.definition.clone())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Looks up and awaits an executor.
    ///
    /// Executor faults are data, not control flow: they come back as a
    /// formatted error string so the model can react on the next iteration.
    /// Only an unknown name is a typed condition.
    pub async fn execute(&self, name: &str, args: Value) -> Result<String, ToolNotFound> {
        let tool = self.tools.get(name).ok_or_else(|| ToolNotFound {
            name: name.to_string(),
        })?;

        match (tool.executor)(args).await {
            Ok(output) => Ok(output),
            Err(e) => Ok(format!("Error executing tool '{name}': {e}")),
        }
    }
}

/// Wraps a plain async closure into the boxed executor shape.
pub fn executor<F, Fut>(f: F) -> ToolExecutor
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<String>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}
