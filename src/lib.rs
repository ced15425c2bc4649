pub mod backend;
pub mod cli;
pub mod client;
pub mod config;
pub mod gate;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod patcher;
pub mod planner;
pub mod prompt;
pub mod registry;
pub mod scanner;
pub mod step;
pub mod toolset;
pub mod workspace;

pub use config::Config;
pub use orchestrator::Agent;
pub use registry::ToolRegistry;
pub use step::Step;
