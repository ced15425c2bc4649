//! # Permission Gate
//!
//! Approval middleware for mutating tools. The gate posts a request on a
//! single-slot channel and suspends the calling execution unit until an
//! external approver sends the decision back. With autopilot enabled the
//! decision resolves immediately and nothing crosses the channel.

use crate::registry::ToolExecutor;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq)]
pub struct PermissionResponse {
    pub allowed: bool,
    pub feedback: Option<String>,
}

impl PermissionResponse {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            feedback: None,
        }
    }

    pub fn deny(feedback: Option<String>) -> Self {
        Self {
            allowed: false,
            feedback,
        }
    }
}

/// A pending approval. `resolve` is a oneshot sender, so resolution is
/// single-use by construction.
#[derive(Debug)]
pub struct PermissionRequest {
    pub id: u64,
    pub tool_name: String,
    pub args: Value,
    pub resolve: oneshot::Sender<PermissionResponse>,
}

pub struct PermissionGate {
    autopilot: AtomicBool,
    next_id: AtomicU64,
    requests: mpsc::Sender<PermissionRequest>,
}

impl PermissionGate {
    /// Creates the gate and the receiving end the approver listens on.
    ///
    /// The channel holds one request: the orchestrator is single-threaded
    /// per run and never raises a second request while one is pending.
    pub fn new(autopilot: bool) -> (Arc<Self>, mpsc::Receiver<PermissionRequest>) {
        let (tx, rx) = mpsc::channel(1);
        let gate = Arc::new(Self {
            autopilot: AtomicBool::new(autopilot),
            next_id: AtomicU64::new(0),
            requests: tx,
        });
        (gate, rx)
    }

    pub fn autopilot(&self) -> bool {
        self.autopilot.load(Ordering::SeqCst)
    }

    pub fn set_autopilot(&self, enabled: bool) {
        self.autopilot.store(enabled, Ordering::SeqCst);
    }

    /// Asks for approval and suspends until the approver answers.
    ///
    /// A dropped approver counts as a denial; the run must never hang on a
    /// channel nobody is listening to.
    pub async fn request(&self, tool_name: &str, args: &Value) -> PermissionResponse {
        if self.autopilot() {
            return PermissionResponse::allow();
        }

        let (tx, rx) = oneshot::channel();
        let request = PermissionRequest {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            tool_name: tool_name.to_string(),
            args: args.clone(),
            resolve: tx,
        };

        if self.requests.send(request).await.is_err() {
            return PermissionResponse::deny(Some("approver unavailable".to_string()));
        }

        rx.await
            .unwrap_or_else(|_| PermissionResponse::deny(Some("approver unavailable".to_string())))
    }

    /// Wraps a mutating tool's executor so every call goes through approval
    /// first. A denial short-circuits without invoking the real executor.
    pub fn wrap(self: &Arc<Self>, tool_name: &str, inner: ToolExecutor) -> ToolExecutor {
        let gate = Arc::clone(self);
        let tool_name = tool_name.to_string();
        Arc::new(move |args: Value| {
            let gate = Arc::clone(&gate);
            let tool_name = tool_name.clone();
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                let response = gate.request(&tool_name, &args).await;
                if !response.allowed {
                    return Ok(match response.feedback {
                        Some(feedback) => {
                            format!("User denied permission with feedback: {feedback}")
                        }
                        None => "User denied permission.".to_string(),
                    });
                }
                inner(args).await
            })
        })
    }
}
