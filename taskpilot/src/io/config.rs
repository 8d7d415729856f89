//! Engine configuration stored at `~/.config/taskpilot/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Completion provider, selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
}

impl Provider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

/// Engine configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub provider: Provider,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Override the provider's default API base URL.
    pub base_url: Option<String>,
    /// Max tokens per reply (Anthropic payload only).
    pub max_tokens: u32,
    /// Steps below this certainty are routed through clarification.
    pub certainty_threshold: f64,
    /// Clarification rounds before the step falls through to the
    /// execution gate with a low-certainty warning.
    pub max_clarify_rounds: u32,
    /// Plans larger than this are rejected as malformed.
    pub max_plan_steps: usize,
    /// Optional wall-clock limit per captured command. None means no timeout.
    pub command_timeout_secs: Option<u64>,
    /// Optional HTTP timeout for completion calls. None means no timeout.
    pub llm_timeout_secs: Option<u64>,
    /// Truncate captured command output beyond this many bytes.
    pub output_limit_bytes: usize,
    /// How many prior records feed the continuity context.
    pub context_window_records: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            max_tokens: 4096,
            certainty_threshold: 0.8,
            max_clarify_rounds: 3,
            max_plan_steps: 20,
            command_timeout_secs: None,
            llm_timeout_secs: None,
            output_limit_bytes: 1_048_576,
            context_window_records: 10,
        }
    }
}

impl EngineConfig {
    /// Effective API base URL: the override, or the provider default.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.certainty_threshold > 0.0 && self.certainty_threshold <= 1.0) {
            return Err(anyhow!("certainty_threshold must be in (0.0, 1.0]"));
        }
        if self.max_plan_steps == 0 {
            return Err(anyhow!("max_plan_steps must be >= 1"));
        }
        if self.output_limit_bytes < 1024 {
            return Err(anyhow!("output_limit_bytes must be >= 1024"));
        }
        if self.context_window_records == 0 {
            return Err(anyhow!("context_window_records must be >= 1"));
        }
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must be set"));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(anyhow!("api_key_env must be set"));
        }
        Ok(())
    }
}

/// Resolve the config file path: `$TASKPILOT_CONFIG`, then
/// `$XDG_CONFIG_HOME/taskpilot/config.toml`, then
/// `$HOME/.config/taskpilot/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TASKPILOT_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(dir).join("taskpilot").join("config.toml"));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("taskpilot")
        .join("config.toml"))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
