use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub ollama: OllamaConfig,
    pub agent: AgentConfig,
    pub tools: ToolGatewayConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `OUTREACH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("OUTREACH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            storage: StorageConfig::from_env_profiled(p),
            llm: LlmConfig::from_env_profiled(p),
            ollama: OllamaConfig::from_env_profiled(p),
            agent: AgentConfig::from_env_profiled(p),
            tools: ToolGatewayConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject settings the agent loop cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.agent.max_iterations == 0 {
            return Err(CoreError::InvalidConfig(
                "AGENT_MAX_ITERATIONS must be at least 1".into(),
            ));
        }
        if self.agent.call_timeout_secs == 0 {
            return Err(CoreError::InvalidConfig(
                "AGENT_CALL_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        if self.agent.draft_timeout_secs == 0 {
            return Err(CoreError::InvalidConfig(
                "AGENT_DRAFT_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(CoreError::InvalidConfig(format!(
                "LLM_TEMPERATURE out of range: {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  storage:     data_dir={}", self.storage.data_dir.display());
        tracing::info!("  llm:         provider={}, configured={}", self.llm.provider, self.llm.is_configured());
        tracing::info!("  ollama:      url={}", self.ollama.url);
        tracing::info!(
            "  agent:       max_iterations={}, call_timeout={}s, draft_timeout={}s",
            self.agent.max_iterations,
            self.agent.call_timeout_secs,
            self.agent.draft_timeout_secs
        );
        tracing::info!(
            "  tools:       gateway={}",
            self.tools.gateway_url.as_deref().unwrap_or("(none)")
        );
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            data_dir: PathBuf::from(profiled_env_or(p, "DATA_DIR", "data")),
        }
    }

    /// Directory holding one JSON state file per session.
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("agent-state")
    }

    /// Directory holding per-session credential files.
    pub fn credentials_dir(&self) -> PathBuf {
        self.data_dir.join("creds")
    }
}

// ── LLM ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "gemini", "openai", "anthropic", "ollama"
    pub provider: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "LLM_PROVIDER", "gemini"),
            gemini_api_key: profiled_env_opt(p, "GEMINI_API_KEY"),
            gemini_model: profiled_env_or(p, "GEMINI_MODEL", "gemini-2.5-flash"),
            openai_api_key: profiled_env_opt(p, "OPENAI_API_KEY"),
            openai_model: profiled_env_or(p, "OPENAI_MODEL", "gpt-4o"),
            openai_base_url: profiled_env_opt(p, "OPENAI_BASE_URL"),
            anthropic_api_key: profiled_env_opt(p, "ANTHROPIC_API_KEY"),
            anthropic_model: profiled_env_or(p, "ANTHROPIC_MODEL", "claude-sonnet-4-5-20250929"),
            temperature: profiled_env_or(p, "LLM_TEMPERATURE", "0.2")
                .parse()
                .unwrap_or(0.2),
            max_tokens: profiled_env_u32(p, "LLM_MAX_TOKENS", 8192),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "gemini" => self.gemini_api_key.is_some(),
            "openai" => self.openai_api_key.is_some(),
            "anthropic" | "claude" => self.anthropic_api_key.is_some(),
            "ollama" => true,
            _ => false,
        }
    }
}

// ── Ollama (local models) ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
}

impl OllamaConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "OLLAMA_URL", "http://localhost:11434"),
            model: profiled_env_or(p, "OLLAMA_MODEL", "llama3.2"),
        }
    }
}

// ── Agent loop ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on model turns per external invocation.
    pub max_iterations: usize,
    /// Timeout applied to each model call and each tool dispatch.
    pub call_timeout_secs: u64,
    /// Timeout for each per-candidate drafting call inside `prepare_outreach`.
    pub draft_timeout_secs: u64,
    /// Default cap on scored candidates kept after a scoring run.
    pub max_scored: usize,
}

impl AgentConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_iterations: profiled_env_u32(p, "AGENT_MAX_ITERATIONS", 10) as usize,
            call_timeout_secs: profiled_env_u64(p, "AGENT_CALL_TIMEOUT_SECS", 120),
            draft_timeout_secs: profiled_env_u64(p, "AGENT_DRAFT_TIMEOUT_SECS", 30),
            max_scored: profiled_env_u32(p, "AGENT_MAX_SCORED", 10) as usize,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            call_timeout_secs: 120,
            draft_timeout_secs: 30,
            max_scored: 10,
        }
    }
}

// ── External capability gateway ───────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolGatewayConfig {
    /// Base URL; each external tool is served at `{gateway_url}/{tool_name}`.
    pub gateway_url: Option<String>,
    pub gateway_token: Option<String>,
}

impl ToolGatewayConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            gateway_url: profiled_env_opt(p, "TOOL_GATEWAY_URL")
                .map(|u| u.trim_end_matches('/').to_string()),
            gateway_token: profiled_env_opt(p, "TOOL_GATEWAY_TOKEN"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.gateway_url.is_some()
    }
}
