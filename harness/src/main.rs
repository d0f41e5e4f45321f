//! `harness` command line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use harness::core::merkle::MerkleCommitment;
use harness::core::plan_parser::{parse_plan, parse_plan_payload};
use harness::core::types::Plan;
use harness::exit_codes;
use harness::io::config::{DEFAULT_CONFIG_FILE, HarnessConfig, load_config, write_config};
use harness::io::model::CommandModel;
use harness::io::run_log::{new_run_id, write_run};
use harness::io::tools::BuiltinTools;
use harness::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(
    name = "harness",
    version,
    about = "Merkle-committed, CFI-gated agent execution harness"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file. The model commands it names are
    /// placeholders to replace with real adapters before `run`.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Run one request through plan, review, verified execution and synthesis.
    Run {
        /// The user prompt.
        prompt: String,
    },
    /// Print the leaf hashes and root of a plan file.
    Commit {
        /// File holding a plan block, or bare plan JSON.
        plan_file: PathBuf,
    },
    /// Recompute a plan file's root and compare it to an expected root.
    Verify {
        plan_file: PathBuf,
        /// Expected hex root.
        #[arg(long)]
        root: String,
    },
}

fn main() {
    harness::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Run { prompt } => cmd_run(&cli.config, &prompt),
        Command::Commit { plan_file } => cmd_commit(&plan_file),
        Command::Verify { plan_file, root } => cmd_verify(&plan_file, &root),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if !force && config_path.exists() {
        println!("{} already exists (use --force to overwrite)", config_path.display());
        return Ok(exit_codes::OK);
    }
    let cfg = HarnessConfig::default();
    write_config(config_path, &cfg)?;
    println!("wrote {}", config_path.display());
    println!(
        "edit upstream.command and downstream.command to point at your model adapters \
         (default `{}` is a placeholder)",
        cfg.upstream.command.join(" ")
    );
    Ok(exit_codes::OK)
}

fn cmd_run(config_path: &Path, prompt: &str) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let timeout = cfg.model_timeout();
    let upstream = CommandModel::new(
        "upstream",
        &cfg.upstream,
        timeout,
        cfg.model_output_limit_bytes,
    )?;
    let downstream = CommandModel::new(
        "downstream",
        &cfg.downstream,
        timeout,
        cfg.model_output_limit_bytes,
    )?;
    let tools = BuiltinTools::new(cfg.tools.clone());
    let orchestrator = Orchestrator::new(upstream, downstream, tools)?;

    let outcome = orchestrator.run(prompt)?;
    if let Some(dir) = &cfg.run_log_dir {
        let run_id = new_run_id();
        let paths = write_run(dir, &run_id, &outcome).context("write run log")?;
        info!(dir = %paths.dir.display(), "run log written");
    }
    println!("{}", outcome.output);
    if let Some(reason) = &outcome.rejection_reason {
        eprintln!("reviewer: {reason}");
    }
    Ok(exit_codes::for_terminal(outcome.terminal))
}

/// Read a plan from a file holding a plan block or bare plan JSON.
fn read_plan(path: &Path) -> Result<Plan> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let plan = match parse_plan(&text)? {
        Some(plan) => plan,
        None => parse_plan_payload(&text)?,
    };
    Ok(plan)
}

fn cmd_commit(plan_file: &Path) -> Result<i32> {
    let plan = read_plan(plan_file)?;
    let commitment = MerkleCommitment::build(&plan.steps)?;
    let payload = serde_json::to_string_pretty(&commitment).context("serialize commitment")?;
    println!("{payload}");
    Ok(exit_codes::OK)
}

fn cmd_verify(plan_file: &Path, expected_root: &str) -> Result<i32> {
    let plan = read_plan(plan_file)?;
    let commitment = MerkleCommitment::build(&plan.steps)?;
    if commitment.root().eq_ignore_ascii_case(expected_root.trim()) {
        println!("ok {}", commitment.root());
        Ok(exit_codes::OK)
    } else {
        println!(
            "mismatch: expected {}, recomputed {}",
            expected_root.trim(),
            commitment.root()
        );
        Ok(exit_codes::HALTED)
    }
}
