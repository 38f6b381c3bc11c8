use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use outreach_core::Config;

use crate::cli::CliArgs;

/// CLI configuration loaded from TOML file.
///
/// Everything here is a fallback: command-line flags and environment
/// variables win over the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default LLM provider name (gemini, openai, anthropic, ollama)
    #[serde(default)]
    pub default_provider: Option<String>,

    /// Default model per provider
    #[serde(default)]
    pub default_models: BTreeMap<String, String>,

    /// API keys keyed by provider name
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,

    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub max_iterations: Option<usize>,

    /// Seeded into every new session's sender info (name, email, company...)
    #[serde(default)]
    pub sender: BTreeMap<String, String>,

    /// Seeded into every new session's user preferences.
    #[serde(default)]
    pub preferences: BTreeMap<String, toml::Value>,
}

/// First of: flag, environment, file.
fn layered<T>(cli: Option<T>, env: Option<T>, file: Option<T>) -> Option<T> {
    cli.or(env).or(file)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn provider_key_var(provider: &str) -> Option<&'static str> {
    match provider {
        "gemini" => Some("GEMINI_API_KEY"),
        "claude" | "anthropic" => Some("ANTHROPIC_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        _ => None,
    }
}

fn provider_model_var(provider: &str) -> Option<&'static str> {
    match provider {
        "gemini" => Some("GEMINI_MODEL"),
        "claude" | "anthropic" => Some("ANTHROPIC_MODEL"),
        "openai" => Some("OPENAI_MODEL"),
        "ollama" => Some("OLLAMA_MODEL"),
        _ => None,
    }
}

impl CliConfig {
    /// Return the default config directory path: ~/.config/outreach-cli/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("outreach-cli");
        Ok(config_dir)
    }

    /// Return the default config file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// Returns default config if the file does not exist.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            debug!(?config_path, "Loading config");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config: {}", config_path.display()))?;
            let config: Self = toml::from_str(&content)
                .with_context(|| format!("failed to parse config: {}", config_path.display()))?;
            Ok(config)
        } else {
            debug!(?config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Resolve the provider name.
    /// Priority: cli_override > LLM_PROVIDER > config file > "gemini".
    pub fn resolve_provider(&self, cli_override: Option<&str>) -> String {
        layered(
            cli_override.map(str::to_string),
            env_value("LLM_PROVIDER"),
            self.default_provider.clone(),
        )
        .unwrap_or_else(|| "gemini".to_string())
    }

    /// Resolve an API key for the given provider.
    /// Priority: cli_override > env var > config file.
    pub fn resolve_api_key(&self, provider: &str, cli_override: Option<&str>) -> Option<String> {
        layered(
            cli_override.map(str::to_string),
            provider_key_var(provider).and_then(env_value),
            self.api_keys.get(provider).cloned(),
        )
    }

    /// Resolve the model name for a provider. `None` keeps the built-in default.
    /// Priority: cli_override > env var > config file.
    pub fn resolve_model(&self, provider: &str, cli_override: Option<&str>) -> Option<String> {
        layered(
            cli_override.map(str::to_string),
            provider_model_var(provider).and_then(env_value),
            self.default_models.get(provider).cloned(),
        )
    }

    /// Layer flags and this file over an environment-built `Config`.
    pub fn apply(&self, args: &CliArgs, config: &mut Config) {
        let provider = self.resolve_provider(args.provider.as_deref());
        let api_key = self.resolve_api_key(&provider, args.api_key.as_deref());
        let model = self.resolve_model(&provider, args.model.as_deref());

        let llm = &mut config.llm;
        match provider.as_str() {
            "gemini" => {
                llm.gemini_api_key = api_key.or(llm.gemini_api_key.take());
                if let Some(model) = model {
                    llm.gemini_model = model;
                }
            }
            "openai" => {
                llm.openai_api_key = api_key.or(llm.openai_api_key.take());
                if let Some(model) = model {
                    llm.openai_model = model;
                }
            }
            "anthropic" | "claude" => {
                llm.anthropic_api_key = api_key.or(llm.anthropic_api_key.take());
                if let Some(model) = model {
                    llm.anthropic_model = model;
                }
            }
            "ollama" => {
                if let Some(model) = model {
                    config.ollama.model = model;
                }
            }
            _ => {}
        }
        config.llm.provider = provider;

        if let Some(dir) = layered(
            args.data_dir.clone(),
            env_value("DATA_DIR").map(PathBuf::from),
            self.data_dir.clone(),
        ) {
            config.storage.data_dir = dir;
        }
        if let Some(max) = layered(
            args.max_iterations,
            env_value("AGENT_MAX_ITERATIONS").and_then(|v| v.parse().ok()),
            self.max_iterations,
        ) {
            config.agent.max_iterations = max;
        }
    }

    /// Sender info for new sessions, as JSON.
    pub fn sender_info(&self) -> Map<String, Value> {
        self.sender
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }

    /// User preferences for new sessions, as JSON.
    pub fn user_preferences(&self) -> Map<String, Value> {
        self.preferences
            .iter()
            .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert!(config.default_provider.is_none());
        assert!(config.api_keys.is_empty());
    }

    #[test]
    fn test_layered_priority() {
        assert_eq!(layered(Some(1), Some(2), Some(3)), Some(1));
        assert_eq!(layered(None, Some(2), Some(3)), Some(2));
        assert_eq!(layered(None, None, Some(3)), Some(3));
        assert_eq!(layered::<u8>(None, None, None), None);
    }

    #[test]
    fn test_resolve_model_override() {
        let config = CliConfig::default();
        assert_eq!(
            config.resolve_model("gemini", Some("gemini-2.5-pro")),
            Some("gemini-2.5-pro".to_string())
        );
    }

    #[test]
    fn test_resolve_api_key_from_config() {
        // Custom provider name has no env var mapping, so the file value is used.
        let mut config = CliConfig::default();
        config
            .api_keys
            .insert("custom-provider".to_string(), "sk-test-123".to_string());
        assert_eq!(
            config.resolve_api_key("custom-provider", None),
            Some("sk-test-123".to_string())
        );
    }

    #[test]
    fn test_resolve_api_key_cli_override() {
        let config = CliConfig::default();
        assert_eq!(
            config.resolve_api_key("gemini", Some("cli-key")),
            Some("cli-key".to_string())
        );
    }

    #[test]
    fn test_apply_flags_win() {
        let args = CliArgs::parse_from([
            "outreach",
            "--provider",
            "ollama",
            "--model",
            "qwen2.5",
            "--data-dir",
            "/tmp/outreach-data",
            "--max-iterations",
            "3",
        ]);
        let mut config = Config::for_profile("");
        CliConfig::default().apply(&args, &mut config);
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.ollama.model, "qwen2.5");
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/outreach-data"));
        assert_eq!(config.agent.max_iterations, 3);
    }

    #[test]
    fn test_load_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_provider = "openai"
max_iterations = 6

[api_keys]
openai = "sk-file"

[sender]
name = "Ada"
company = "Analytical Engines"

[preferences]
max_candidates = 3
"#,
        )
        .unwrap();

        let config = CliConfig::load(path.to_str()).unwrap();
        assert_eq!(config.default_provider.as_deref(), Some("openai"));
        assert_eq!(config.max_iterations, Some(6));
        assert_eq!(config.sender_info()["company"], "Analytical Engines");
        assert_eq!(config.user_preferences()["max_candidates"], 3);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("absent.toml");
        let config = CliConfig::load(path.to_str()).unwrap();
        assert!(config.default_provider.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = CliConfig::default();
        config.default_provider = Some("gemini".into());
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: CliConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
    }
}
