use std::path::PathBuf;

use clap::Parser;

/// Outreach automation agent.
///
/// Runs a session in a terminal REPL: the agent plans, calls tools, and
/// stops to ask when it needs your input.
#[derive(Parser, Debug)]
#[command(name = "outreach", about = "Outreach automation agent")]
pub struct CliArgs {
    /// LLM provider: gemini, openai, anthropic, or ollama
    #[arg(long)]
    pub provider: Option<String>,

    /// Model name override (uses provider default if not set)
    #[arg(long)]
    pub model: Option<String>,

    /// API key (overrides env var and config file)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Path to config file (default: ~/.config/outreach-cli/config.toml)
    #[arg(long)]
    pub config: Option<String>,

    /// Data directory holding session state and credentials
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Resume a previous session by ID
    #[arg(long)]
    pub session: Option<String>,

    /// List all saved sessions
    #[arg(long)]
    pub list_sessions: bool,

    /// Maximum model turns per message
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Correlate an inbound event (JSON file) with its sessions, then exit
    #[arg(long, value_name = "FILE")]
    pub inbound: Option<PathBuf>,

    /// Goal to send as the first message of the session
    #[arg(long)]
    pub goal: Option<String>,
}
