//! The model-facing collaborator boundary.
//!
//! The orchestrator only ever sees role-tagged messages going out and a
//! single string coming back; provider wire formats live behind this trait.

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A chat-completion backend.
///
/// Implementations provide `chat_stream`; `chat` coalesces the fragments so
/// the caller never observes a partial response.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn chat_stream(&self, messages: Vec<ChatMessage>) -> BoxStream<'static, Result<String>>;

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let mut stream = self.chat_stream(messages);
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}
