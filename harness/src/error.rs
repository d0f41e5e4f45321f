//! Error taxonomy for the harness.
//!
//! Four conditions halt a request: [`HarnessError::PlanParse`],
//! [`HarnessError::ReActParse`], [`HarnessError::Integrity`] and
//! [`HarnessError::ToolNotFound`]. None of them is retried or downgraded.
//! Collaborator failures (model or tool I/O) travel as [`HarnessError::Other`].

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("plan parse error: {0}")]
    PlanParse(PlanParseFailure),
    #[error("ReACT parse error: {failure}\nPayload: {raw}")]
    ReActParse {
        failure: ActionParseFailure,
        /// The offending text: the whole response, or the argument payload
        /// when only the arguments section is at fault.
        raw: String,
    },
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityViolation),
    #[error("tool '{tool}' is not in the registry")]
    ToolNotFound { tool: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why a present plan block was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanParseFailure {
    #[error("plan payload is not valid JSON: {0}")]
    MalformedJson(String),
    #[error("schema validation failed:\n- {}", .0.join("\n- "))]
    Schema(Vec<String>),
    #[error("plan invariants violated:\n- {}", .0.join("\n- "))]
    Invariants(Vec<String>),
}

/// Sections of the per-step reasoning/action protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Thought,
    Action,
    Args,
}

impl Section {
    pub fn label(self) -> &'static str {
        match self {
            Section::Thought => "Thought",
            Section::Action => "Action",
            Section::Args => "Args",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Named failure branches of the per-step response grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionParseFailure {
    #[error("missing {0} section")]
    MissingSection(Section),
    #[error("sections must appear in order Thought, Action, Args")]
    OutOfOrder,
    #[error("empty {0} section")]
    EmptySection(Section),
    #[error("action must be a single tool-name token, got '{0}'")]
    InvalidToolToken(String),
    #[error("unterminated fenced code block in Args")]
    UnterminatedFence,
    #[error("Args JSON is malformed: {0}")]
    MalformedJson(String),
    #[error("Args must be a JSON object")]
    NotAnObject,
}

/// A committed structure and what was about to execute disagree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityViolation {
    #[error("hash mismatch at step index {index} (id={step_id}); plan integrity violated")]
    LeafMismatch { index: usize, step_id: i64 },
    #[error("tool mismatch: the verified plan requires '{expected}', but '{actual}' was proposed")]
    ToolMismatch { expected: String, actual: String },
    #[error("argument mutated: '{key}' planned {planned} but executed {executed}")]
    ArgumentMutated {
        key: String,
        planned: Value,
        executed: Value,
    },
    #[error("unauthorized argument injected: '{key}'")]
    ArgumentInjected { key: String },
    #[error("post-execution root mismatch: committed {committed}, recomputed {recomputed}")]
    RootMismatch {
        committed: String,
        recomputed: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn argument_mutation_names_key_and_both_values() {
        let err = HarnessError::from(IntegrityViolation::ArgumentMutated {
            key: "path".to_string(),
            planned: json!("a.txt"),
            executed: json!("b.txt"),
        });
        let msg = err.to_string();
        assert!(msg.contains("'path'"));
        assert!(msg.contains("\"a.txt\""));
        assert!(msg.contains("\"b.txt\""));
    }

    #[test]
    fn collaborator_errors_display_transparently() {
        let err = HarnessError::from(anyhow::anyhow!("connection reset"));
        assert!(matches!(err, HarnessError::Other(_)));
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn schema_failures_are_listed() {
        let failure = PlanParseFailure::Schema(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(failure.to_string(), "schema validation failed:\n- a\n- b");
    }
}
