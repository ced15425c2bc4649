//! Registers the built-in tool catalogue.
//!
//! Ungated tools only read project state; everything that mutates the
//! filesystem or runs commands goes through the [`PermissionGate`].
//! Tool failures come back as strings so the loop can keep going.

use crate::gate::PermissionGate;
use crate::patcher::Patcher;
use crate::planner::{TodoList, TodoStatus};
use crate::registry::{ToolDefinition, ToolRegistry, executor};
use crate::scanner::ProjectScanner;
use crate::workspace;
use anyhow::{Result, anyhow};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::process::Command;

/// How many files `search_text` is willing to open per query.
const SEARCH_FILE_LIMIT: usize = 50;
const SUMMARY_LINE_LIMIT: usize = 100;

/// Shared state the tool executors close over.
#[derive(Clone)]
pub struct ToolContext {
    pub root: PathBuf,
    pub patcher: Arc<Patcher>,
    pub scanner: Arc<ProjectScanner>,
    pub todos: Arc<Mutex<TodoList>>,
}

impl ToolContext {
    pub fn new(root: PathBuf) -> Self {
        Self {
            patcher: Arc::new(Patcher::new(root.clone())),
            scanner: Arc::new(ProjectScanner::new(root.clone())),
            todos: Arc::new(Mutex::new(TodoList::new())),
            root,
        }
    }
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct CreateFileArgs {
    path: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct EditFileArgs {
    path: String,
    diff: String,
}

#[derive(Deserialize)]
struct SearchTextArgs {
    query: String,
}

#[derive(Deserialize)]
struct SearchFilesArgs {
    pattern: String,
}

#[derive(Deserialize)]
struct RunCommandArgs {
    command: String,
    #[serde(default)]
    cwd: Option<String>,
}

#[derive(Deserialize)]
struct TodoWriteArgs {
    action: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    status: Option<TodoStatus>,
}

#[derive(Deserialize)]
struct GitCommitArgs {
    message: String,
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| anyhow!("invalid arguments: {e}"))
}

fn path_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": { "type": "string", "description": description }
        },
        "required": ["path"]
    })
}

/// Builds the full registry for a session. Registration happens once; the
/// catalogue is immutable afterwards.
pub fn build_registry(ctx: &ToolContext, gate: &Arc<PermissionGate>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    // --- Filesystem, read-only ---
    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "read_file".to_string(),
                description: "Read the contents of a file.".to_string(),
                parameters: path_schema("Path to the file."),
            },
            executor(move |args| {
                let ctx = ctx.clone();
                async move {
                    let args: PathArgs = parse_args(args)?;
                    let path = workspace::resolve(&ctx.root, &args.path)?;
                    Ok(match fs::read_to_string(&path) {
                        Ok(content) => content,
                        Err(e) => format!("Error reading file: {e}"),
                    })
                }
            }),
        );
    }

    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "list_dir".to_string(),
                description: "List contents of a directory.".to_string(),
                parameters: path_schema("Directory path."),
            },
            executor(move |args| {
                let ctx = ctx.clone();
                async move {
                    let args: PathArgs = parse_args(args)?;
                    let path = workspace::resolve(&ctx.root, &args.path)?;
                    let entries = match fs::read_dir(&path) {
                        Ok(entries) => entries,
                        Err(e) => return Ok(format!("Error listing dir: {e}")),
                    };
                    let mut names: Vec<String> = entries
                        .filter_map(Result::ok)
                        .map(|e| e.file_name().to_string_lossy().into_owned())
                        .collect();
                    names.sort();
                    Ok(names.join("\n"))
                }
            }),
        );
    }

    // --- Filesystem, gated ---
    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "create_file".to_string(),
                description: "Create a new file (fails if exists).".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Path for the new file." },
                        "content": { "type": "string", "description": "Initial content (optional)." }
                    },
                    "required": ["path"]
                }),
            },
            gate.wrap(
                "create_file",
                executor(move |args| {
                    let ctx = ctx.clone();
                    async move {
                        let args: CreateFileArgs = parse_args(args)?;
                        let path = workspace::resolve(&ctx.root, &args.path)?;
                        if path.exists() {
                            return Ok(
                                "Error: File already exists. Use write_file to overwrite."
                                    .to_string(),
                            );
                        }
                        if let Some(parent) = path.parent() {
                            fs::create_dir_all(parent)?;
                        }
                        fs::write(&path, &args.content)?;
                        Ok(format!("File created at {}", args.path))
                    }
                }),
            ),
        );
    }

    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "write_file".to_string(),
                description: "Overwrite an entire file.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Path to the file." },
                        "content": { "type": "string", "description": "New content." }
                    },
                    "required": ["path", "content"]
                }),
            },
            gate.wrap(
                "write_file",
                executor(move |args| {
                    let ctx = ctx.clone();
                    async move {
                        let args: WriteFileArgs = parse_args(args)?;
                        let path = workspace::resolve(&ctx.root, &args.path)?;
                        fs::write(&path, &args.content)?;
                        Ok(format!("File written to {}", args.path))
                    }
                }),
            ),
        );
    }

    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "edit_file".to_string(),
                description: "Modify a file using a Unified Diff.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Path to the file." },
                        "diff": { "type": "string", "description": "Unified Diff string to apply." }
                    },
                    "required": ["path", "diff"]
                }),
            },
            gate.wrap(
                "edit_file",
                executor(move |args| {
                    let ctx = ctx.clone();
                    async move {
                        let args: EditFileArgs = parse_args(args)?;
                        // The patcher handles backups and all-or-nothing
                        // application internally.
                        let applied = ctx.patcher.apply_patch(&args.path, &args.diff)?;
                        Ok(if applied {
                            "Patch applied successfully.".to_string()
                        } else {
                            "Patch application failed (check context/backups).".to_string()
                        })
                    }
                }),
            ),
        );
    }

    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "create_dir".to_string(),
                description: "Create a new directory.".to_string(),
                parameters: path_schema("Directory path."),
            },
            gate.wrap(
                "create_dir",
                executor(move |args| {
                    let ctx = ctx.clone();
                    async move {
                        let args: PathArgs = parse_args(args)?;
                        let path = workspace::resolve(&ctx.root, &args.path)?;
                        fs::create_dir_all(&path)?;
                        Ok(format!("Directory created: {}", args.path))
                    }
                }),
            ),
        );
    }

    // --- Search & discovery ---
    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "search_text".to_string(),
                description: "Search for text across project files.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Text or regex to search for." }
                    },
                    "required": ["query"]
                }),
            },
            executor(move |args| {
                let ctx = ctx.clone();
                async move {
                    let args: SearchTextArgs = parse_args(args)?;
                    let regex = match Regex::new(&args.query) {
                        Ok(regex) => regex,
                        Err(e) => return Ok(format!("Search error: {e}")),
                    };
                    let files = ctx.scanner.scan();
                    let mut matches = Vec::new();
                    for file in files.iter().take(SEARCH_FILE_LIMIT) {
                        let Ok(path) = workspace::resolve(&ctx.root, file) else {
                            continue;
                        };
                        if let Ok(content) = fs::read_to_string(&path) {
                            if regex.is_match(&content) {
                                matches.push(file.clone());
                            }
                        }
                    }
                    Ok(format!("Found in:\n{}", matches.join("\n")))
                }
            }),
        );
    }

    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "search_files".to_string(),
                description: "Find files by name or pattern.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "pattern": { "type": "string", "description": "Substring of the path to match." }
                    },
                    "required": ["pattern"]
                }),
            },
            executor(move |args| {
                let ctx = ctx.clone();
                async move {
                    let args: SearchFilesArgs = parse_args(args)?;
                    let matches: Vec<String> = ctx
                        .scanner
                        .scan()
                        .into_iter()
                        .filter(|f| f.contains(&args.pattern))
                        .collect();
                    Ok(matches.join("\n"))
                }
            }),
        );
    }

    // --- Context ---
    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "scan_context".to_string(),
                description: "Scan project structure and understand file hierarchy.".to_string(),
                parameters: json!({ "type": "object", "properties": {} }),
            },
            executor(move |_args| {
                let ctx = ctx.clone();
                async move {
                    let files = ctx.scanner.scan();
                    Ok(format!("Project Files ({}):\n{}", files.len(), files.join("\n")))
                }
            }),
        );
    }

    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "summarize_file".to_string(),
                description: "Get a summary of a file (first 100 lines).".to_string(),
                parameters: path_schema("File path."),
            },
            executor(move |args| {
                let ctx = ctx.clone();
                async move {
                    let args: PathArgs = parse_args(args)?;
                    let path = workspace::resolve(&ctx.root, &args.path)?;
                    let content = match fs::read_to_string(&path) {
                        Ok(content) => content,
                        Err(e) => return Ok(format!("Error: {e}")),
                    };
                    let head: Vec<&str> = content.lines().take(SUMMARY_LINE_LIMIT).collect();
                    Ok(format!("Summary (first 100 lines):\n{}", head.join("\n")))
                }
            }),
        );
    }

    // --- Planning ---
    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "todo_write".to_string(),
                description: "Add a new task to the plan or update an existing task status."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "action": { "type": "string", "enum": ["add", "update"], "description": "Action to perform." },
                        "text": { "type": "string", "description": "Text content of the task (required for add)." },
                        "id": { "type": "integer", "description": "ID of the task to update (required for update)." },
                        "status": { "type": "string", "enum": ["pending", "in-progress", "completed", "failed"], "description": "New status." }
                    },
                    "required": ["action"]
                }),
            },
            executor(move |args| {
                let ctx = ctx.clone();
                async move {
                    let args: TodoWriteArgs = parse_args(args)?;
                    let mut todos = ctx.todos.lock().unwrap();
                    match args.action.as_str() {
                        "add" => {
                            let text = args.text.ok_or_else(|| anyhow!("'text' is required for add"))?;
                            todos.add(text);
                        }
                        "update" => {
                            let id = args.id.ok_or_else(|| anyhow!("'id' is required for update"))?;
                            let status =
                                args.status.ok_or_else(|| anyhow!("'status' is required for update"))?;
                            if !todos.update_status(id, status) {
                                return Ok(format!("Error: no todo with id {id}."));
                            }
                        }
                        other => return Ok(format!("Error: unknown action '{other}'.")),
                    }
                    Ok("Todo updated.".to_string())
                }
            }),
        );
    }

    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "todo_read".to_string(),
                description: "Read the current plan and task statuses.".to_string(),
                parameters: json!({ "type": "object", "properties": {} }),
            },
            executor(move |_args| {
                let ctx = ctx.clone();
                async move {
                    let todos = ctx.todos.lock().unwrap();
                    Ok(serde_json::to_string_pretty(todos.list())?)
                }
            }),
        );
    }

    // --- Command execution ---
    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "run_command".to_string(),
                description: "Execute a shell command.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "command": { "type": "string", "description": "Command to execute." },
                        "cwd": { "type": "string", "description": "Working directory (optional)." }
                    },
                    "required": ["command"]
                }),
            },
            gate.wrap(
                "run_command",
                executor(move |args| {
                    let ctx = ctx.clone();
                    async move {
                        let args: RunCommandArgs = parse_args(args)?;
                        let cwd = match &args.cwd {
                            Some(cwd) => workspace::resolve(&ctx.root, cwd)?,
                            None => ctx.root.clone(),
                        };
                        let output = Command::new("sh")
                            .arg("-c")
                            .arg(&args.command)
                            .current_dir(&cwd)
                            .output()
                            .await;
                        Ok(match output {
                            Ok(output) => format!(
                                "STDOUT:\n{}\nSTDERR:\n{}",
                                String::from_utf8_lossy(&output.stdout),
                                String::from_utf8_lossy(&output.stderr)
                            ),
                            Err(e) => format!("Command failed: {e}"),
                        })
                    }
                }),
            ),
        );
    }

    // --- Git ---
    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "git_diff".to_string(),
                description: "Show unstaged changes (git diff).".to_string(),
                parameters: json!({ "type": "object", "properties": {} }),
            },
            executor(move |_args| {
                let ctx = ctx.clone();
                async move {
                    let output = Command::new("git")
                        .arg("diff")
                        .current_dir(&ctx.root)
                        .output()
                        .await;
                    Ok(match output {
                        Ok(output) => {
                            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                            if stdout.is_empty() {
                                "No changes.".to_string()
                            } else {
                                stdout
                            }
                        }
                        Err(e) => format!("Git error: {e}"),
                    })
                }
            }),
        );
    }

    {
        let ctx = ctx.clone();
        registry.register(
            ToolDefinition {
                name: "git_commit".to_string(),
                description: "Commit staged changes.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "message": { "type": "string", "description": "Commit message." }
                    },
                    "required": ["message"]
                }),
            },
            gate.wrap(
                "git_commit",
                executor(move |args| {
                    let ctx = ctx.clone();
                    async move {
                        let args: GitCommitArgs = parse_args(args)?;
                        let output = Command::new("git")
                            .args(["commit", "-m", &args.message])
                            .current_dir(&ctx.root)
                            .output()
                            .await;
                        Ok(match output {
                            Ok(output) => format!(
                                "{}{}",
                                String::from_utf8_lossy(&output.stdout),
                                String::from_utf8_lossy(&output.stderr)
                            ),
                            Err(e) => format!("Commit error: {e}"),
                        })
                    }
                }),
            ),
        );
    }

    registry
}
