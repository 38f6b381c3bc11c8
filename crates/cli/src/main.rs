mod cli;
mod config;
mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use outreach_agent::{
    Correlator, FileCredentialSource, FileStateStore, InboundEvent, SessionManager, SessionSeed,
};
use outreach_core::config::{load_dotenv, Config};
use outreach_llm::create_completion_model;
use outreach_tool_runtime::{
    outreach_registry, AgentLoop, LoopSettings, SessionSummary, StateStore,
};

use crate::cli::CliArgs;
use crate::config::CliConfig;
use crate::terminal::{Input, Terminal, TerminalObserver};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();
    let terminal = Terminal::new();

    // Environment first, then the config file and flags on top
    let cli_config = CliConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;
    let mut config = Config::from_env();
    cli_config.apply(&args, &mut config);
    config.validate().context("invalid configuration")?;
    config.log_summary();

    let store = Arc::new(
        FileStateStore::new(&config.storage.state_dir())
            .context("failed to open session state store")?,
    );

    // Handle --list-sessions
    if args.list_sessions {
        let sessions = saved_sessions(store.as_ref())?;
        terminal.print_sessions(&sessions)?;
        return Ok(());
    }

    let model = create_completion_model(&config).context("failed to create LLM provider")?;
    let registry = outreach_registry(model.clone(), &config.agent, &config.tools)
        .context("failed to build tool registry")?;
    info!(tools = registry.len(), model = model.model_name(), "Agent ready");

    let agent = AgentLoop::new(model.clone(), Arc::new(registry), store)
        .with_settings(LoopSettings::from_config(&config.agent))
        .with_credentials(Arc::new(FileCredentialSource::new(
            &config.storage.credentials_dir(),
        )))
        .with_observer(Arc::new(TerminalObserver));
    let manager = Arc::new(SessionManager::new(Arc::new(agent)));

    // Handle --inbound
    if let Some(path) = &args.inbound {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read inbound event: {}", path.display()))?;
        let event: InboundEvent = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse inbound event: {}", path.display()))?;
        let report = Correlator::new(manager.clone())
            .handle(event)
            .await
            .context("failed to process inbound event")?;
        terminal.print_report(&report)?;
        return Ok(());
    }

    // Resume or start a session
    let session_id = if let Some(ref session_id) = args.session {
        info!(session = %session_id, "Resuming session");
        let summary = manager
            .resume_session(session_id)
            .await
            .with_context(|| format!("failed to resume session '{}'", session_id))?;
        terminal.print_info(&format!(
            "Resumed session: {} ({}, {} turns)",
            summary.session_id,
            summary.status.label(),
            summary.turns
        ))?;
        summary.session_id
    } else {
        let seed = SessionSeed::default()
            .with_preferences(cli_config.user_preferences())
            .with_sender_info(cli_config.sender_info());
        manager
            .start_session(seed)
            .await
            .context("failed to start session")?
    };

    terminal.print_banner(&config.llm.provider, model.model_name(), &session_id)?;

    if let Some(goal) = &args.goal {
        send(&terminal, &manager, &session_id, goal).await?;
    }

    // REPL loop
    loop {
        let prompt = match manager.get_state(&session_id).await {
            Ok(state) if state.status().is_awaiting() => "answer> ",
            _ => "you> ",
        };
        match terminal.read_input(prompt)? {
            Input::Empty => continue,
            Input::Exit => {
                terminal.print_info(&format!(
                    "Session saved: {} (resume with --session {})",
                    session_id, session_id
                ))?;
                break;
            }
            Input::ShowState => match manager.get_state(&session_id).await {
                Ok(state) => terminal.print_state(&state)?,
                Err(e) => terminal.print_error(&e.to_string())?,
            },
            Input::EndSession => {
                let summary = manager
                    .end_session(&session_id)
                    .await
                    .context("failed to end session")?;
                terminal.print_info(&format!(
                    "Session {} ended after {} turns.",
                    summary.session_id, summary.turns
                ))?;
                break;
            }
            Input::Message(text) => send(&terminal, &manager, &session_id, &text).await?,
        }
    }

    Ok(())
}

/// Deliver one message and show the result. Store failures end the REPL.
async fn send(
    terminal: &Terminal,
    manager: &SessionManager,
    session_id: &str,
    text: &str,
) -> Result<()> {
    match manager.send_message(session_id, text).await {
        Ok(sent) => terminal.print_outcome(&sent.outcome),
        Err(e) => {
            error!(error = %e, "Agent loop error");
            terminal.print_error(&format!("{:#}", e))?;
            Err(e).context("session state could not be saved")
        }
    }
}

/// Summaries of stored sessions without building a model.
fn saved_sessions(store: &dyn StateStore) -> Result<Vec<SessionSummary>> {
    let mut sessions = Vec::new();
    for id in store.list()? {
        match store.load(&id) {
            Ok(Some(record)) => sessions.push(record.summary()),
            Ok(None) => {}
            Err(e) => warn!(session = %id, error = %e, "Skipping unreadable session"),
        }
    }
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(sessions)
}
