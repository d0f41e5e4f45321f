//! Harness configuration stored in `harness.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "harness.toml";

/// Harness configuration (TOML).
///
/// Missing fields fall back to defaults; every load is validated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Per-call wall-clock budget for a model adapter command.
    pub model_timeout_secs: u64,

    /// Truncate model adapter stdout/stderr beyond this many bytes.
    pub model_output_limit_bytes: usize,

    /// Directory for per-run artifacts. Nothing is written when unset.
    pub run_log_dir: Option<PathBuf>,

    /// Planning and synthesis model.
    pub upstream: ModelCommandConfig,

    /// Safety review and per-step reasoning model.
    pub downstream: ModelCommandConfig,

    pub tools: ToolSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelCommandConfig {
    /// Adapter argv. Receives the message history as JSON on stdin and
    /// prints the completion on stdout. The default `harness-model` is a
    /// placeholder name; no such program ships with the harness.
    pub command: Vec<String>,
}

impl Default for ModelCommandConfig {
    fn default() -> Self {
        Self {
            command: vec!["harness-model".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolSettings {
    /// `file_write` may only create files below this directory.
    pub workspace_dir: PathBuf,

    /// `summarize` truncates its input to this many characters.
    pub summarize_limit_chars: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("workspace"),
            summarize_limit_chars: 4000,
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            model_timeout_secs: 120,
            model_output_limit_bytes: 1_000_000,
            run_log_dir: None,
            upstream: ModelCommandConfig::default(),
            downstream: ModelCommandConfig::default(),
            tools: ToolSettings::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model_timeout_secs == 0 {
            return Err(anyhow!("model_timeout_secs must be > 0"));
        }
        if self.model_output_limit_bytes == 0 {
            return Err(anyhow!("model_output_limit_bytes must be > 0"));
        }
        if self.tools.summarize_limit_chars == 0 {
            return Err(anyhow!("tools.summarize_limit_chars must be > 0"));
        }
        if self.tools.workspace_dir.as_os_str().is_empty() {
            return Err(anyhow!("tools.workspace_dir must not be empty"));
        }
        for (label, model) in [("upstream", &self.upstream), ("downstream", &self.downstream)] {
            if model.command.first().is_none_or(|program| program.trim().is_empty()) {
                return Err(anyhow!("{label}.command must be a non-empty array"));
            }
        }
        Ok(())
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HarnessConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
