//! OpenRouter-compatible transport behind the [`LlmClient`] trait.

use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient};
use anyhow::{Result, bail};
use futures::StreamExt;
use futures::stream::BoxStream;
use openrouter_api::{OpenRouterClient, Ready, types::chat::ChatCompletionRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn initialize_client(config: &Config) -> Result<OpenRouterClient<Ready>> {
    let api_key = if let Some(env_var) = config.backend.config().api_key_env_var {
        match std::env::var(env_var) {
            Ok(val) => val,
            Err(_) => bail!("environment variable {} not set", env_var),
        }
    } else {
        // Keyless backends (ollama) still need a syntactically valid key.
        "sk-or-v1-0000000000000000000000000000000000000000000000000000000000000000".to_string()
    };
    let client = OpenRouterClient::new()
        .with_base_url(&config.base_url)?
        .with_timeout(Duration::from_secs(config.timeout_seconds))
        .with_api_key(api_key)?;
    Ok(client)
}

pub struct OpenRouterBackend {
    client: Arc<OpenRouterClient<Ready>>,
    model: String,
}

impl OpenRouterBackend {
    pub fn new(client: OpenRouterClient<Ready>, model: impl Into<String>) -> Self {
        Self {
            client: Arc::new(client),
            model: model.into(),
        }
    }
}

impl LlmClient for OpenRouterBackend {
    fn chat_stream(&self, messages: Vec<ChatMessage>) -> BoxStream<'static, Result<String>> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages
                .into_iter()
                .map(|m| openrouter_api::types::chat::Message {
                    role: m.role.as_str().to_string(),
                    content: m.content,
                    name: None,
                    tool_calls: None,
                })
                .collect(),
            tools: None,
            stream: Some(true),
            response_format: None,
            provider: None,
            models: None,
            transforms: None,
        };

        // The underlying stream borrows the client, so it is driven inside a
        // task that owns it and the fragments are forwarded over a channel.
        let client = Arc::clone(&self.client);
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let api = match client.chat() {
                Ok(api) => api,
                Err(e) => {
                    let _ = tx.send(Err(e.into()));
                    return;
                }
            };
            let mut stream = api.chat_completion_stream(request);
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(chunk) => {
                        let fragment = chunk
                            .choices
                            .first()
                            .and_then(|choice| choice.delta.content.clone());
                        if let Some(fragment) = fragment {
                            if tx.send(Ok(fragment)).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e.into()));
                        return;
                    }
                }
            }
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }
}
