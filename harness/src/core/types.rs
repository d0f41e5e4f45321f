//! Shared deterministic types for harness core logic.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument value meaning "resolved only at execution time".
pub const DYNAMIC_SENTINEL: &str = "<DYNAMIC>";

/// Tool arguments: a JSON object keyed by parameter name.
pub type Args = Map<String, Value>;

/// One declared tool invocation of a plan.
///
/// Immutable once parsed: mutating a step before verification is exactly
/// what the commitment exists to detect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: i64,
    pub tool: String,
    pub args: Args,
    pub description: String,
}

/// Ordered goal-plus-steps proposal from the planning model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    pub steps: Vec<Step>,
}

/// Tool choice extracted from one reasoning/action response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAction {
    pub thought: String,
    pub tool: String,
    pub args: Args,
}

/// Log entry produced after each verified step execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub step_id: i64,
    pub tool: String,
    pub args: Args,
    pub description: String,
    pub thought: String,
    pub observation: String,
    pub verified: bool,
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the message history handed to a model capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// True if `value` is the dynamic-argument sentinel.
pub fn is_dynamic(value: &Value) -> bool {
    value.as_str() == Some(DYNAMIC_SENTINEL)
}
