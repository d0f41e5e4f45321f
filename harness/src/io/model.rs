//! Model capability abstraction.
//!
//! The orchestrator holds two [`ModelClient`] values: an upstream one for
//! planning and synthesis and a downstream one for review and per-step
//! reasoning. They may be backed by the same model. [`CommandModel`] talks to
//! any adapter program over stdin/stdout; tests use scripted clients.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::types::Message;
use crate::io::config::ModelCommandConfig;
use crate::io::process::run_command_with_timeout;

/// A chat-completion capability.
pub trait ModelClient {
    /// Complete the conversation, returning the model's text.
    fn complete(&self, messages: &[Message]) -> Result<String>;
}

impl<M: ModelClient + ?Sized> ModelClient for &M {
    fn complete(&self, messages: &[Message]) -> Result<String> {
        (**self).complete(messages)
    }
}

/// Model backed by an external adapter command.
///
/// The adapter receives `[{"role": .., "content": ..}, ..]` as JSON on stdin
/// and prints the completion on stdout.
#[derive(Debug, Clone)]
pub struct CommandModel {
    label: String,
    argv: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandModel {
    pub fn new(
        label: impl Into<String>,
        config: &ModelCommandConfig,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Result<Self> {
        if config.command.is_empty() {
            return Err(anyhow!("model command must be a non-empty array"));
        }
        Ok(Self {
            label: label.into(),
            argv: config.command.clone(),
            timeout,
            output_limit_bytes,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl ModelClient for CommandModel {
    #[instrument(skip_all, fields(model = %self.label, message_count = messages.len()))]
    fn complete(&self, messages: &[Message]) -> Result<String> {
        let payload = serde_json::to_vec(messages).context("serialize model messages")?;
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| anyhow!("model command must be a non-empty array"))?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        let output =
            run_command_with_timeout(cmd, Some(&payload), self.timeout, self.output_limit_bytes)
                .with_context(|| {
                    format!(
                        "run {label} model command `{program}` (set {label}.command in the config)",
                        label = self.label
                    )
                })?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "model command timed out");
            return Err(anyhow!(
                "{} model timed out after {:?}",
                self.label,
                self.timeout
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "model command failed");
            return Err(anyhow!(
                "{} model failed with status {:?}: {}",
                self.label,
                output.status.code(),
                output.stderr_excerpt()
            ));
        }
        let text = output.stdout_lossy().trim().to_string();
        if text.is_empty() {
            return Err(anyhow!("{} model returned an empty completion", self.label));
        }
        debug!(response_len = text.len(), "model completed");
        Ok(text)
    }
}
