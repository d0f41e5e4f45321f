//! Per-run artifacts under the configured `run_log_dir`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::state::{Phase, RunOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary<'a> {
    pub run_id: &'a str,
    pub terminal: Phase,
    pub output: &'a str,
    pub trace: &'a [Phase],
    pub root: Option<&'a str>,
    pub rejection_reason: Option<&'a str>,
    pub halt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunPaths {
    pub dir: PathBuf,
    pub outcome_path: PathBuf,
    pub plan_path: PathBuf,
    pub commitment_path: PathBuf,
    pub records_path: PathBuf,
}

impl RunPaths {
    pub fn new(root: &Path, run_id: &str) -> Self {
        let dir = root.join(run_id);
        Self {
            outcome_path: dir.join("outcome.json"),
            plan_path: dir.join("plan.json"),
            commitment_path: dir.join("commitment.json"),
            records_path: dir.join("records.json"),
            dir,
        }
    }
}

/// `run-<unix-millis>`.
pub fn new_run_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("run-{millis}")
}

/// Write the artifacts of one finished run. Plan, commitment and records are
/// written only when the run produced them.
pub fn write_run(root: &Path, run_id: &str, outcome: &RunOutcome) -> Result<RunPaths> {
    let paths = RunPaths::new(root, run_id);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create run dir {}", paths.dir.display()))?;

    let summary = OutcomeSummary {
        run_id,
        terminal: outcome.terminal,
        output: &outcome.output,
        trace: &outcome.trace,
        root: outcome.commitment.as_ref().map(|c| c.root()),
        rejection_reason: outcome.rejection_reason.as_deref(),
        halt: outcome.halt.as_ref().map(|err| err.to_string()),
    };

    // Fixed order keeps partially written runs easy to interpret.
    write_json(&paths.outcome_path, &summary)?;
    if let Some(plan) = &outcome.plan {
        write_json(&paths.plan_path, plan)?;
    }
    if let Some(commitment) = &outcome.commitment {
        write_json(&paths.commitment_path, commitment)?;
    }
    if !outcome.records.is_empty() {
        write_json(&paths.records_path, &outcome.records)?;
    }
    Ok(paths)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}
