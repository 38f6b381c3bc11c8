use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use serde_json::{Map, Value};
use std::io::{self, Write};

use outreach_agent::CorrelationReport;
use outreach_tool_runtime::{
    AdvanceOutcome, LoopObserver, SessionStatus, SessionSummary, StateRecord,
};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const USER_PROMPT: Color = Color::Green;
    const THOUGHT: Color = Color::Cyan;
    const TOOL_CALL: Color = Color::Yellow;
    const TOOL_RESULT: Color = Color::DarkGreen;
    const NOTICE: Color = Color::White;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

const MAX_RESULT_CHARS: usize = 500;

/// A line of REPL input.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Message(String),
    ShowState,
    EndSession,
    Empty,
    Exit,
}

pub fn parse_input(line: &str) -> Input {
    match line.trim() {
        "" => Input::Empty,
        "exit" | "quit" | "/exit" | "/quit" => Input::Exit,
        "/state" => Input::ShowState,
        "/end" => Input::EndSession,
        text => Input::Message(text.to_string()),
    }
}

/// Shorten long output for display, on a char boundary.
fn truncate(content: &str, max: usize) -> String {
    match content.char_indices().nth(max) {
        Some((cut, _)) => format!("{}... ({} chars total)", &content[..cut], content.chars().count()),
        None => content.to_string(),
    }
}

fn print_colored(color: Color, text: &str) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, SetForegroundColor(color), Print(text), ResetColor)?;
    stdout.flush()?;
    Ok(())
}

/// Manages terminal I/O for the interactive REPL.
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// Print the startup banner.
    pub fn print_banner(&self, provider: &str, model: &str, session_id: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("outreach"),
            ResetColor,
            Print(" - Outreach Automation Agent\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!("Provider: {} | Model: {} | Session: {}\n", provider, model, session_id)),
            Print("Type '/state' for progress, '/end' to close the session, 'exit' or 'quit' to leave.\n"),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Read a line of user input with prompt. End of input counts as exit.
    pub fn read_input(&self, prompt: &str) -> Result<Input> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::USER_PROMPT),
            Print(prompt),
            ResetColor,
        )?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(Input::Exit);
        }
        Ok(parse_input(&line))
    }

    /// Show how an invocation ended.
    pub fn print_outcome(&self, outcome: &AdvanceOutcome) -> Result<()> {
        if let Some(raw) = &outcome.raw_answer {
            print_colored(Colors::THOUGHT, &format!("\n{}\n", raw.trim()))?;
        }
        match &outcome.status {
            SessionStatus::AwaitingHumanInput { prompt } => {
                print_colored(Colors::HEADER, &format!("\n{}\n", prompt))?;
            }
            SessionStatus::Terminated => {
                if !outcome.thought.is_empty() && outcome.raw_answer.is_none() {
                    print_colored(Colors::THOUGHT, &format!("\n{}\n", outcome.thought))?;
                }
                print_colored(
                    Colors::DIM,
                    &format!("[done: {} tool calls in {} turns]\n", outcome.dispatches, outcome.iterations),
                )?;
            }
            SessionStatus::Running => {
                print_colored(
                    Colors::DIM,
                    &format!(
                        "[paused after {} turns; send a message to continue]\n",
                        outcome.iterations
                    ),
                )?;
            }
        }
        Ok(())
    }

    /// Print the session's progress.
    pub fn print_state(&self, record: &StateRecord) -> Result<()> {
        let summary = record.summary();
        let mut lines = vec![
            format!("Session:    {}", summary.session_id),
            format!("Status:     {}", summary.status.label()),
            format!("Goal:       {}", summary.raw_goal.as_deref().unwrap_or("-")),
            format!("Candidates: {} found, {} scored", summary.candidates, summary.scored_candidates),
            format!("Messages:   {} drafted, {} sent", summary.outreach_messages, record.outbound_threads().len()),
            format!("Meetings:   {}", summary.scheduled_meetings),
        ];
        if let Some(budget) = summary.budget_remaining {
            lines.push(format!("Budget:     {budget}"));
        }
        if let Some(ranking) = record.ranking_summary() {
            lines.push(format!("Ranking:    {}", truncate(ranking, 200)));
        }
        for (i, scored) in record.scored_candidates().iter().enumerate() {
            let name = scored
                .candidate
                .get("name")
                .or_else(|| scored.candidate.get("title"))
                .and_then(Value::as_str)
                .unwrap_or("(unnamed)");
            lines.push(format!("  {}. {} ({})", i + 1, name, scored.score.value()));
        }
        if summary.errors > 0 {
            lines.push(format!("Errors:     {}", summary.errors));
            for err in record.errors() {
                lines.push(format!("  - {}", truncate(err, 160)));
            }
        }
        print_colored(Colors::NOTICE, &format!("{}\n", lines.join("\n")))
    }

    /// Print a session listing.
    pub fn print_sessions(&self, sessions: &[SessionSummary]) -> Result<()> {
        let mut stdout = io::stdout();
        if sessions.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print("No saved sessions found.\n"),
                ResetColor,
            )?;
            return Ok(());
        }

        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("Saved Sessions:\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "{:<38} {:<22} {:<40} {:<6}\n",
                "ID", "STATUS", "GOAL", "TURNS"
            )),
            Print(format!("{}\n", "-".repeat(108))),
            ResetColor,
        )?;

        for s in sessions {
            let goal = s.raw_goal.as_deref().unwrap_or("-");
            let goal = if goal.chars().count() > 38 {
                format!("{}...", goal.chars().take(35).collect::<String>())
            } else {
                goal.to_string()
            };
            execute!(
                stdout,
                Print(format!(
                    "{:<38} {:<22} {:<40} {:<6}\n",
                    s.session_id,
                    s.status.label(),
                    goal,
                    s.turns,
                )),
            )?;
        }

        stdout.flush()?;
        Ok(())
    }

    pub fn print_report(&self, report: &CorrelationReport) -> Result<()> {
        for injection in &report.injected {
            print_colored(
                Colors::TOOL_RESULT,
                &format!(
                    "[{}] -> session {} ({})\n",
                    injection.message_id,
                    injection.session_id,
                    injection.outcome.status.label()
                ),
            )?;
        }
        for id in &report.unmatched {
            print_colored(Colors::DIM, &format!("[{}] no matching session\n", id))?;
        }
        for id in &report.duplicates {
            print_colored(Colors::DIM, &format!("[{}] already processed\n", id))?;
        }
        Ok(())
    }

    /// Print an error message.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        print_colored(Colors::ERROR, &format!("Error: {}\n", msg))
    }

    /// Print an info message.
    pub fn print_info(&self, msg: &str) -> Result<()> {
        print_colored(Colors::DIM, &format!("{}\n", msg))
    }
}

/// Streams loop progress to the terminal as it happens.
pub struct TerminalObserver;

impl LoopObserver for TerminalObserver {
    fn on_thought(&self, _session_id: &str, thought: &str) {
        print_colored(Colors::THOUGHT, &format!("\n{}\n", thought)).ok();
    }

    fn on_dispatch(&self, _session_id: &str, tool: &str, inputs: &Map<String, Value>) {
        let args = truncate(&Value::Object(inputs.clone()).to_string(), 200);
        print_colored(Colors::TOOL_CALL, &format!("[tool: {}] {}\n", tool, args)).ok();
    }

    fn on_result(&self, _session_id: &str, tool: &str, result: &Value, is_error: bool) {
        let (color, label) = if is_error {
            (Colors::ERROR, "error")
        } else {
            (Colors::TOOL_RESULT, "result")
        };
        let content = match result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        print_colored(
            color,
            &format!("  [{} {}]: {}\n", tool, label, truncate(&content, MAX_RESULT_CHARS)),
        )
        .ok();
    }

    fn on_notice(&self, _session_id: &str, message: &str) {
        print_colored(Colors::NOTICE, &format!("\n{}\n", message)).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("  \n"), Input::Empty);
        assert_eq!(parse_input("quit\n"), Input::Exit);
        assert_eq!(parse_input("/exit"), Input::Exit);
        assert_eq!(parse_input("/state"), Input::ShowState);
        assert_eq!(parse_input("/end"), Input::EndSession);
        assert_eq!(
            parse_input(" my budget is $500 \n"),
            Input::Message("my budget is $500".into())
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        let long = "é".repeat(12);
        assert_eq!(truncate(&long, 10), format!("{}... (12 chars total)", "é".repeat(10)));
    }
}
