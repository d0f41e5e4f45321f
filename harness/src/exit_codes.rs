//! Stable exit codes for harness CLI commands.

use crate::core::state::Phase;

/// Request synthesized, answered directly, or commitment verified.
pub const OK: i32 = 0;
/// Invalid config, unreadable input, or collaborator failure.
pub const INVALID: i32 = 1;
/// The safety review rejected the plan; nothing was executed.
pub const REJECTED: i32 = 2;
/// Execution halted on a parse, integrity, or missing-tool error.
pub const HALTED: i32 = 3;
/// Post-execution root mismatch; all results were discarded.
pub const DISCARDED: i32 = 4;

/// Exit code for a finished run.
pub fn for_terminal(phase: Phase) -> i32 {
    match phase {
        Phase::DirectResponse | Phase::Synthesized => OK,
        Phase::Rejected => REJECTED,
        Phase::Discarded => DISCARDED,
        Phase::HaltedPlanParse
        | Phase::HaltedActionParse
        | Phase::HaltedIntegrity
        | Phase::HaltedToolMissing => HALTED,
        // Not terminal; a finished run never ends here.
        _ => INVALID,
    }
}
