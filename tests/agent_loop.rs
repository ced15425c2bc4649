//! End-to-end loop behavior against a scripted model backend.

use anyhow::Result;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::json;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tokio::sync::mpsc;

use tern::gate::PermissionGate;
use tern::llm::{ChatMessage, LlmClient};
use tern::orchestrator::Agent;
use tern::registry::ToolRegistry;
use tern::step::Step;
use tern::toolset::{self, ToolContext};

/// Replays canned responses, each as a list of stream fragments, and records
/// every request it receives.
struct ScriptedClient {
    responses: Mutex<VecDeque<Vec<String>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedClient {
    fn new(responses: Vec<Vec<&str>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|fragments| fragments.into_iter().map(String::from).collect())
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

impl LlmClient for ScriptedClient {
    fn chat_stream(&self, messages: Vec<ChatMessage>) -> BoxStream<'static, Result<String>> {
        self.requests.lock().unwrap().push(messages);
        let fragments = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        futures::stream::iter(fragments.into_iter().map(Ok)).boxed()
    }
}

fn project_registry(root: &Path) -> Arc<ToolRegistry> {
    let ctx = ToolContext::new(root.to_path_buf());
    let (gate, _rx) = PermissionGate::new(true);
    Arc::new(toolset::build_registry(&ctx, &gate))
}

fn empty_registry() -> Arc<ToolRegistry> {
    Arc::new(ToolRegistry::new())
}

async fn run_agent(
    client: Arc<ScriptedClient>,
    registry: Arc<ToolRegistry>,
    max_steps: usize,
    prompt: &str,
) -> (String, Vec<Step>, Vec<Step>) {
    let mut agent = Agent::new(client, registry, max_steps);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = agent.run(prompt, &[], &tx).await.unwrap();
    drop(tx);
    let mut events = Vec::new();
    while let Some(step) = rx.recv().await {
        events.push(step);
    }
    (result, agent.history, events)
}

#[tokio::test]
async fn final_answer_ends_the_run_immediately() {
    let client = ScriptedClient::new(vec![vec![
        r#"{"thought": "done", "finalAnswer": "it is 4"}"#,
    ]]);
    let (result, history, events) =
        run_agent(Arc::clone(&client), empty_registry(), 10, "what is 2+2").await;

    assert_eq!(result, "it is 4");
    assert_eq!(history.len(), 1);
    assert_eq!(events.len(), 1);
    assert_eq!(client.requests().len(), 1);
}

#[tokio::test]
async fn tool_output_becomes_the_next_prompt() {
    let tmp = tempdir().unwrap();
    let client = ScriptedClient::new(vec![
        vec![
            r#"{"thought": "writing", "toolCall": {"name": "write_file", "arguments": {"path": "a.txt", "content": "hi"}}}"#,
        ],
        vec![r#"{"thought": "saved", "finalAnswer": "done"}"#],
    ]);
    let (result, history, _) = run_agent(
        Arc::clone(&client),
        project_registry(tmp.path()),
        10,
        "save hi to a.txt",
    )
    .await;

    assert_eq!(result, "done");
    assert_eq!(fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "hi");
    assert_eq!(
        history[0].tool_output.as_deref(),
        Some("File written to a.txt")
    );

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    let followup = requests[1].last().unwrap();
    assert_eq!(
        followup.content,
        "Tool 'write_file' returned: File written to a.txt"
    );
}

#[tokio::test]
async fn step_budget_caps_the_run() {
    let stall = r#"{"thought": "thinking"}"#;
    let client = ScriptedClient::new(vec![vec![stall], vec![stall], vec![stall], vec![stall]]);
    let (result, history, _) =
        run_agent(Arc::clone(&client), empty_registry(), 3, "never finish").await;

    assert_eq!(result, "Max steps reached.");
    assert_eq!(history.len(), 3);
    assert_eq!(client.requests().len(), 3);
}

#[tokio::test]
async fn parse_failure_retries_and_consumes_budget() {
    let client = ScriptedClient::new(vec![
        vec!["I refuse to speak JSON {"],
        vec![r#"{"thought": "ok", "finalAnswer": "recovered"}"#],
    ]);
    let (result, history, events) =
        run_agent(Arc::clone(&client), empty_registry(), 10, "task").await;

    assert_eq!(result, "recovered");
    // The diagnostic retry step is surfaced but never enters history.
    assert_eq!(history.len(), 1);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].thought, "Failed to parse model response. Retrying...");

    // The retry re-sends the same prompt.
    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].last().unwrap().content,
        requests[1].last().unwrap().content
    );
}

#[tokio::test]
async fn parse_failures_alone_exhaust_the_budget() {
    let garbage = "not json at all";
    let client = ScriptedClient::new(vec![vec![garbage], vec![garbage]]);
    let (result, history, events) =
        run_agent(Arc::clone(&client), empty_registry(), 2, "task").await;

    assert_eq!(result, "Max steps reached.");
    assert!(history.is_empty());
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn streamed_fragments_are_coalesced_before_parsing() {
    let client = ScriptedClient::new(vec![vec![
        r#"{"thought": "split"#,
        r#" across", "finalAnswer":"#,
        r#" "whole"}"#,
    ]]);
    let (result, history, _) =
        run_agent(Arc::clone(&client), empty_registry(), 10, "task").await;

    assert_eq!(result, "whole");
    assert_eq!(history[0].thought, "split across");
}

#[tokio::test]
async fn unknown_tool_name_is_reported_to_the_model() {
    let client = ScriptedClient::new(vec![
        vec![r#"{"thought": "try", "toolCall": {"name": "bogus", "arguments": {}}}"#],
        vec![r#"{"thought": "oops", "finalAnswer": "sorry"}"#],
    ]);
    let (result, history, _) =
        run_agent(Arc::clone(&client), empty_registry(), 10, "task").await;

    assert_eq!(result, "sorry");
    assert_eq!(history[0].tool_output.as_deref(), Some("Tool 'bogus' not found."));
    let requests = client.requests();
    assert_eq!(
        requests[1].last().unwrap().content,
        "Tool 'bogus' returned: Tool 'bogus' not found."
    );
}

#[tokio::test]
async fn final_answer_wins_over_tool_call() {
    let tmp = tempdir().unwrap();
    let client = ScriptedClient::new(vec![vec![
        r#"{"thought": "both", "finalAnswer": "answer", "toolCall": {"name": "write_file", "arguments": {"path": "x.txt", "content": "no"}}}"#,
    ]]);
    let (result, _, _) = run_agent(
        Arc::clone(&client),
        project_registry(tmp.path()),
        10,
        "task",
    )
    .await;

    assert_eq!(result, "answer");
    assert!(!tmp.path().join("x.txt").exists());
}

#[tokio::test]
async fn pause_flag_stops_before_the_next_step() {
    let client = ScriptedClient::new(vec![vec![
        r#"{"thought": "done", "finalAnswer": "hi"}"#,
    ]]);
    let mut agent = Agent::new(
        Arc::clone(&client) as Arc<dyn LlmClient>,
        empty_registry(),
        5,
    );
    agent
        .pause_flag()
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = agent.run("task", &[], &tx).await.unwrap();
    assert_eq!(result, "Paused.");
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn every_request_carries_system_prior_and_current() {
    let client = ScriptedClient::new(vec![vec![
        r#"{"thought": "done", "finalAnswer": "hi"}"#,
    ]]);
    let registry = empty_registry();
    let mut agent = Agent::new(Arc::clone(&client) as Arc<dyn LlmClient>, registry, 5);
    let prior = vec![
        ChatMessage::user("earlier question"),
        ChatMessage::assistant("earlier answer"),
    ];
    let (tx, _rx) = mpsc::unbounded_channel();
    agent.run("current question", &prior, &tx).await.unwrap();

    let request = client.requests().remove(0);
    assert_eq!(request.len(), 4);
    assert_eq!(request[1].content, "earlier question");
    assert_eq!(request[2].content, "earlier answer");
    assert_eq!(request[3].content, "current question");
}
