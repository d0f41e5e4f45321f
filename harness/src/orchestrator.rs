//! Request lifecycle: route, commit, review, verified execution, post-check,
//! synthesis.
//!
//! One request is strictly sequential. The four halt conditions end the run
//! with a [`RunOutcome`] carrying a halt message and an empty record log;
//! collaborator failures (model or tool I/O) are returned as `Err`.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::action_parser::parse_action;
use crate::core::cfi::check_action;
use crate::core::merkle::MerkleCommitment;
use crate::core::plan_parser::parse_plan;
use crate::core::review::{Verdict, judge_review};
use crate::core::state::{Phase, RunOutcome};
use crate::core::types::{ExecutionRecord, Plan, Step};
use crate::error::{HarnessError, IntegrityViolation};
use crate::io::model::ModelClient;
use crate::io::prompt::PromptEngine;
use crate::io::tools::ToolRegistry;

pub const REJECTION_NOTICE: &str = "Plan rejected by safety gate. Execution halted.";
pub const DISCARD_NOTICE: &str =
    "Post-execution root mismatch. Plan may have been mutated during execution. Results discarded.";

/// A plan whose steps all executed, awaiting the post-execution root check.
#[derive(Debug)]
pub struct ExecutedRun<'a> {
    pub prompt: &'a str,
    /// Planner response that carried the plan block.
    pub response: &'a str,
    pub plan: Plan,
    pub commitment: MerkleCommitment,
    pub records: Vec<ExecutionRecord>,
    pub trace: Vec<Phase>,
}

/// Drives one request through the harness.
///
/// `U` plans and synthesizes; `D` reviews plans and reasons per step;
/// `T` owns every tool side effect.
pub struct Orchestrator<U, D, T> {
    upstream: U,
    downstream: D,
    tools: T,
    prompts: PromptEngine,
}

impl<U, D, T> Orchestrator<U, D, T>
where
    U: ModelClient,
    D: ModelClient,
    T: ToolRegistry,
{
    pub fn new(upstream: U, downstream: D, tools: T) -> Result<Self> {
        let prompts = PromptEngine::new(tools.descriptors())?;
        Ok(Self {
            upstream,
            downstream,
            tools,
            prompts,
        })
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    pub fn downstream(&self) -> &D {
        &self.downstream
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    /// Run the full pipeline for `prompt`.
    #[instrument(skip_all, fields(prompt_len = prompt.len()))]
    pub fn run(&self, prompt: &str) -> Result<RunOutcome> {
        let mut trace = Vec::new();
        enter(&mut trace, Phase::Received);
        enter(&mut trace, Phase::Route);
        let response = self.route(prompt)?;

        let plan = match parse_plan(&response) {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                enter(&mut trace, Phase::DirectResponse);
                return Ok(RunOutcome {
                    terminal: Phase::DirectResponse,
                    output: response,
                    trace,
                    plan: None,
                    commitment: None,
                    records: Vec::new(),
                    rejection_reason: None,
                    halt: None,
                });
            }
            Err(err) => return halted(trace, None, None, err),
        };
        enter(&mut trace, Phase::PlanParsed);

        let commitment = match MerkleCommitment::build(&plan.steps) {
            Ok(commitment) => commitment,
            Err(err) => return halted(trace, Some(plan), None, err),
        };
        enter(&mut trace, Phase::Committed);
        info!(root = commitment.root(), steps = commitment.len(), "plan committed");

        let verdict = self.review(&plan)?;
        enter(&mut trace, Phase::SafetyChecked);
        if let Verdict::Rejected { reason } = verdict {
            warn!(%reason, "plan rejected by safety review");
            enter(&mut trace, Phase::Rejected);
            return Ok(RunOutcome {
                terminal: Phase::Rejected,
                output: REJECTION_NOTICE.to_string(),
                trace,
                plan: Some(plan),
                commitment: Some(commitment),
                records: Vec::new(),
                rejection_reason: Some(reason),
                halt: None,
            });
        }

        enter(&mut trace, Phase::Executing);
        let records = match self.execute_plan(&plan, &commitment) {
            Ok(records) => records,
            Err(err) => return halted(trace, Some(plan), Some(commitment), err),
        };
        enter(&mut trace, Phase::Executed);

        self.finalize(ExecutedRun {
            prompt,
            response: &response,
            plan,
            commitment,
            records,
            trace,
        })
    }

    /// Upstream routing call: plan block or direct answer.
    #[instrument(skip_all)]
    pub fn route(&self, prompt: &str) -> Result<String> {
        let messages = self.prompts.planner_messages(prompt)?;
        self.upstream.complete(&messages)
    }

    /// Downstream safety review of the full committed plan.
    #[instrument(skip_all, fields(goal = %plan.goal))]
    pub fn review(&self, plan: &Plan) -> Result<Verdict> {
        let messages = self.prompts.review_messages(plan)?;
        let response = self.downstream.complete(&messages)?;
        Ok(judge_review(&response))
    }

    /// Verified execution loop. Each step's leaf is checked before the step
    /// reaches the downstream model; the first failure ends the loop.
    #[instrument(skip_all, fields(steps = plan.steps.len()))]
    pub fn execute_plan(
        &self,
        plan: &Plan,
        commitment: &MerkleCommitment,
    ) -> Result<Vec<ExecutionRecord>, HarnessError> {
        let mut records: Vec<ExecutionRecord> = Vec::with_capacity(plan.steps.len());
        for (index, step) in plan.steps.iter().enumerate() {
            if !commitment.verify_leaf(index, step) {
                warn!(index, step_id = step.id, "leaf hash mismatch");
                return Err(IntegrityViolation::LeafMismatch {
                    index,
                    step_id: step.id,
                }
                .into());
            }
            let prior = records.last().map(|r| r.observation.as_str());
            let record = self.execute_step(step, prior)?;
            records.push(record);
        }
        Ok(records)
    }

    /// One reasoning/action cycle for a step whose leaf already verified.
    #[instrument(skip_all, fields(step_id = step.id, tool = %step.tool))]
    pub fn execute_step(
        &self,
        step: &Step,
        prior: Option<&str>,
    ) -> Result<ExecutionRecord, HarnessError> {
        let messages = self.prompts.step_messages(step, prior)?;
        let response = self.downstream.complete(&messages)?;
        let action = parse_action(&response)?;
        check_action(step, &action)?;
        if !self.tools.contains(&action.tool) {
            warn!(tool = %action.tool, "tool not in registry");
            return Err(HarnessError::ToolNotFound { tool: action.tool });
        }
        let observation = self.tools.invoke(&action.tool, &action.args)?;
        info!(observation_len = observation.len(), "step executed");
        Ok(ExecutionRecord {
            step_id: step.id,
            tool: action.tool,
            args: action.args,
            description: step.description.clone(),
            thought: action.thought,
            observation,
            verified: true,
        })
    }

    /// Post-execution root check, then synthesis from the verified log.
    ///
    /// A mismatch discards every record and makes no further model call.
    #[instrument(skip_all, fields(root = run.commitment.root()))]
    pub fn finalize(&self, run: ExecutedRun<'_>) -> Result<RunOutcome> {
        let ExecutedRun {
            prompt,
            response,
            plan,
            commitment,
            records,
            mut trace,
        } = run;

        let verified = post_verify(&plan, &commitment);
        enter(&mut trace, Phase::PostVerified);
        if let Err(err) = verified {
            warn!(error = %err, "post-execution verification failed");
            enter(&mut trace, Phase::Discarded);
            return Ok(RunOutcome {
                terminal: Phase::Discarded,
                output: DISCARD_NOTICE.to_string(),
                trace,
                plan: Some(plan),
                commitment: Some(commitment),
                records: Vec::new(),
                rejection_reason: None,
                halt: Some(err),
            });
        }

        let messages = self
            .prompts
            .synthesis_messages(prompt, response, &records)?;
        let output = self.upstream.complete(&messages)?;
        enter(&mut trace, Phase::Synthesized);
        Ok(RunOutcome {
            terminal: Phase::Synthesized,
            output,
            trace,
            plan: Some(plan),
            commitment: Some(commitment),
            records,
            rejection_reason: None,
            halt: None,
        })
    }
}

/// Rebuild the commitment from `plan` and compare roots.
pub fn post_verify(plan: &Plan, commitment: &MerkleCommitment) -> Result<(), HarnessError> {
    let rebuilt = MerkleCommitment::build(&plan.steps)?;
    if rebuilt.root() != commitment.root() {
        return Err(IntegrityViolation::RootMismatch {
            committed: commitment.root().to_string(),
            recomputed: rebuilt.root().to_string(),
        }
        .into());
    }
    Ok(())
}

fn enter(trace: &mut Vec<Phase>, phase: Phase) {
    info!(phase = phase.as_str(), "transition");
    trace.push(phase);
}

/// Terminal outcome for a halt; collaborator failures propagate instead.
fn halted(
    mut trace: Vec<Phase>,
    plan: Option<Plan>,
    commitment: Option<MerkleCommitment>,
    err: HarnessError,
) -> Result<RunOutcome> {
    let Some(terminal) = Phase::for_halt(&err) else {
        return match err {
            HarnessError::Other(source) => Err(source),
            other => Err(other.into()),
        };
    };
    warn!(phase = terminal.as_str(), error = %err, "request halted");
    enter(&mut trace, terminal);
    Ok(RunOutcome {
        terminal,
        output: format!("Execution halted: {err}"),
        trace,
        plan,
        commitment,
        records: Vec::new(),
        rejection_reason: None,
        halt: Some(err),
    })
}
