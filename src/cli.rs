use crate::backend::Backend;
use clap::Parser;

/// A bounded agent loop for coding tasks
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The task for the agent; omit for an interactive session
    pub prompt: Option<String>,

    /// Auto-approve all tool executions
    #[arg(long)]
    pub autopilot: bool,

    /// Override the configured model
    #[arg(long)]
    pub model: Option<String>,

    /// Override the configured backend
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Maximum model calls per task
    #[arg(long)]
    pub max_steps: Option<usize>,
}
