use anyhow::Result;
use clap::Parser;
use console::style;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;

use tern::client::OpenRouterBackend;
use tern::gate::{PermissionGate, PermissionRequest, PermissionResponse};
use tern::llm::ChatMessage;
use tern::orchestrator::Agent;
use tern::step::Step;
use tern::toolset::{self, ToolContext};
use tern::{cli, client, config, workspace};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let mut config = config::load_or_create()?;
    if let Some(backend) = cli.backend {
        config.base_url = backend.config().base_url;
        config.backend = backend;
    }
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(max_steps) = cli.max_steps {
        config.max_steps = max_steps;
    }
    if cli.autopilot {
        config.autopilot = true;
    }

    let api = client::initialize_client(&config)?;
    let llm = Arc::new(OpenRouterBackend::new(api, config.model.clone()));

    let root = workspace::find_project_root(&std::env::current_dir()?);
    let ctx = ToolContext::new(root.clone());
    let (gate, mut perm_rx) = PermissionGate::new(config.autopilot);
    let registry = Arc::new(toolset::build_registry(&ctx, &gate));

    println!("Backend: {:?}", config.backend);
    println!("Model: {}", config.model);
    println!("Project root: {}", root.display());
    if config.autopilot {
        println!("{}", style("Autopilot enabled: all tools auto-approved.").yellow());
    }

    let mut agent = Agent::new(llm, registry, config.max_steps);
    let pause = agent.pause_flag();
    let mut stdin = spawn_stdin_channel();
    let mut prior: Vec<ChatMessage> = Vec::new();
    let mut next_prompt = cli.prompt;
    let one_shot = next_prompt.is_some();

    loop {
        let prompt = match next_prompt.take() {
            Some(prompt) => prompt,
            None => {
                print!("{} ", style("user>").cyan().bold());
                io::stdout().flush()?;
                match stdin.recv().await.flatten() {
                    Some(line) if !line.is_empty() => line,
                    Some(_) => continue,
                    // Ctrl+D ends the session.
                    None => break,
                }
            }
        };

        pause.store(false, Ordering::SeqCst);
        let result = {
            let (step_tx, mut step_rx) = mpsc::unbounded_channel();
            let run = agent.run(&prompt, &prior, &step_tx);
            tokio::pin!(run);

            let result = loop {
                tokio::select! {
                    result = &mut run => break result?,
                    Some(step) = step_rx.recv() => render_step(&step),
                    Some(request) = perm_rx.recv() => {
                        let response = prompt_for_approval(&request, &ctx, &mut stdin).await?;
                        let _ = request.resolve.send(response);
                    }
                    _ = tokio::signal::ctrl_c() => {
                        println!("\n{}", style("Pausing after the current step...").yellow());
                        pause.store(true, Ordering::SeqCst);
                    }
                }
            };
            // Steps emitted after the run resolved are still rendered.
            while let Ok(step) = step_rx.try_recv() {
                render_step(&step);
            }
            result
        };

        println!("\n[{}]\n{result}", style("assistant").blue());
        prior.push(ChatMessage::user(prompt));
        prior.push(ChatMessage::assistant(result));

        if one_shot {
            break;
        }
    }

    Ok(())
}

fn render_step(step: &Step) {
    if !step.thought.is_empty() {
        println!("{} {}", style("thought:").dim(), style(&step.thought).dim());
    }
    if let Some(call) = &step.tool_call {
        println!("{} {}({})", style("tool:").yellow(), call.name, call.arguments);
    }
    if let Some(output) = &step.tool_output {
        println!("{}", style(output).dim());
    }
}

async fn prompt_for_approval(
    request: &PermissionRequest,
    ctx: &ToolContext,
    stdin: &mut mpsc::Receiver<Option<String>>,
) -> Result<PermissionResponse> {
    println!(
        "\n{} {} {}",
        style("Tool call:").magenta().bold(),
        request.tool_name,
        serde_json::to_string_pretty(&request.args)?
    );

    // Edits get a dry-run rendering of the patch before the decision.
    if request.tool_name == "edit_file" {
        let path = request.args.get("path").and_then(|v| v.as_str());
        let diff = request.args.get("diff").and_then(|v| v.as_str());
        if let (Some(path), Some(diff)) = (path, diff) {
            match ctx.patcher.preview(path, diff) {
                Ok(preview) => println!("{preview}"),
                Err(e) => println!("{}", style(format!("Preview unavailable: {e}")).dim()),
            }
        }
    }

    print!(
        "{} ",
        style("Approve? [y]es / [n]o / type feedback>").magenta()
    );
    io::stdout().flush()?;

    let line = stdin.recv().await.flatten();
    Ok(match line.as_deref() {
        None => PermissionResponse::deny(None),
        Some("") | Some("y") | Some("Y") => PermissionResponse::allow(),
        Some("n") | Some("N") => PermissionResponse::deny(None),
        Some(feedback) => PermissionResponse::deny(Some(feedback.to_string())),
    })
}

fn spawn_stdin_channel() -> mpsc::Receiver<Option<String>> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        loop {
            let result = tokio::task::spawn_blocking(|| {
                let mut buffer = String::new();
                match io::stdin().read_line(&mut buffer) {
                    Ok(0) => Ok(None),
                    Ok(_) => Ok(Some(buffer.trim().to_string())),
                    Err(e) => Err(e),
                }
            })
            .await;

            match result {
                Ok(Ok(line_opt)) => {
                    if tx.send(line_opt).await.is_err() {
                        break;
                    }
                }
                _ => {
                    tx.send(None).await.ok();
                    break;
                }
            }
        }
    });
    rx
}
