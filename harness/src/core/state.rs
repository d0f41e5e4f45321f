//! Request lifecycle states and the outcome of one request.

use serde::Serialize;

use crate::core::merkle::MerkleCommitment;
use crate::core::types::{ExecutionRecord, Plan};
use crate::error::HarnessError;

/// States of the request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Received,
    Route,
    DirectResponse,
    HaltedPlanParse,
    PlanParsed,
    Committed,
    SafetyChecked,
    Rejected,
    Executing,
    HaltedActionParse,
    HaltedIntegrity,
    HaltedToolMissing,
    Executed,
    PostVerified,
    Discarded,
    Synthesized,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Received => "RECEIVED",
            Phase::Route => "ROUTE",
            Phase::DirectResponse => "DIRECT_RESPONSE",
            Phase::HaltedPlanParse => "HALTED_PLAN_PARSE",
            Phase::PlanParsed => "PLAN_PARSED",
            Phase::Committed => "COMMITTED",
            Phase::SafetyChecked => "SAFETY_CHECKED",
            Phase::Rejected => "REJECTED",
            Phase::Executing => "EXECUTING",
            Phase::HaltedActionParse => "HALTED_ACTION_PARSE",
            Phase::HaltedIntegrity => "HALTED_INTEGRITY",
            Phase::HaltedToolMissing => "HALTED_TOOL_MISSING",
            Phase::Executed => "EXECUTED",
            Phase::PostVerified => "POST_VERIFIED",
            Phase::Discarded => "DISCARDED",
            Phase::Synthesized => "SYNTHESIZED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::DirectResponse
                | Phase::HaltedPlanParse
                | Phase::Rejected
                | Phase::HaltedActionParse
                | Phase::HaltedIntegrity
                | Phase::HaltedToolMissing
                | Phase::Discarded
                | Phase::Synthesized
        )
    }

    /// Terminal state reached when `err` halts the request, or `None` for
    /// collaborator failures that are not halts.
    pub fn for_halt(err: &HarnessError) -> Option<Phase> {
        match err {
            HarnessError::PlanParse(_) | HarnessError::Validation(_) => {
                Some(Phase::HaltedPlanParse)
            }
            HarnessError::ReActParse { .. } => Some(Phase::HaltedActionParse),
            HarnessError::Integrity(_) => Some(Phase::HaltedIntegrity),
            HarnessError::ToolNotFound { .. } => Some(Phase::HaltedToolMissing),
            HarnessError::Other(_) => None,
        }
    }
}

/// Everything a single request produced.
///
/// `records` is non-empty only for [`Phase::Synthesized`]: any halt or a
/// post-execution mismatch discards the whole log.
#[derive(Debug)]
pub struct RunOutcome {
    pub terminal: Phase,
    /// User-visible text: model output, or a halt/rejection notice.
    pub output: String,
    /// Every state visited, in order, ending with `terminal`.
    pub trace: Vec<Phase>,
    pub plan: Option<Plan>,
    pub commitment: Option<MerkleCommitment>,
    pub records: Vec<ExecutionRecord>,
    /// Reviewer response when the plan was rejected.
    pub rejection_reason: Option<String>,
    /// The error that halted the request, if any.
    pub halt: Option<HarnessError>,
}

impl RunOutcome {
    pub fn visited(&self, phase: Phase) -> bool {
        self.trace.contains(&phase)
    }
}
