//! Plan block grammar: one `<planthenexecute>` block holding the plan JSON.
//!
//! A response without the block is the direct-response path, not an error.
//! A block that is present must decode, conform to the bundled JSON Schema and
//! satisfy the semantic invariants below; otherwise the whole plan is refused.

use std::collections::HashSet;
use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::types::Plan;
use crate::error::{HarnessError, PlanParseFailure};

pub const PLAN_OPEN_TAG: &str = "<planthenexecute>";
pub const PLAN_CLOSE_TAG: &str = "</planthenexecute>";

const PLAN_SCHEMA: &str = include_str!("../../schemas/plan.schema.json");

static PLAN_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<planthenexecute>(.*?)</planthenexecute>").unwrap()
});

static PLAN_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(PLAN_SCHEMA).expect("plan schema should be valid JSON");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("plan schema should compile")
});

/// Extract the plan from a model response.
///
/// Returns `Ok(None)` when no plan block is present.
#[instrument(skip_all, fields(response_len = text.len()))]
pub fn parse_plan(text: &str) -> Result<Option<Plan>, HarnessError> {
    let Some(caps) = PLAN_BLOCK_RE.captures(text) else {
        debug!("no plan block found");
        return Ok(None);
    };
    let payload = caps.get(1).map_or("", |m| m.as_str());
    parse_plan_payload(payload).map(Some)
}

/// Decode and validate the JSON payload of a plan block.
pub fn parse_plan_payload(payload: &str) -> Result<Plan, HarnessError> {
    let value: Value = serde_json::from_str(payload.trim())
        .map_err(|err| HarnessError::PlanParse(PlanParseFailure::MalformedJson(err.to_string())))?;

    let violations: Vec<String> = PLAN_VALIDATOR
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !violations.is_empty() {
        return Err(HarnessError::PlanParse(PlanParseFailure::Schema(violations)));
    }

    let plan: Plan = serde_json::from_value(value)
        .map_err(|err| HarnessError::PlanParse(PlanParseFailure::Schema(vec![err.to_string()])))?;

    let errors = validate_plan_invariants(&plan);
    if !errors.is_empty() {
        return Err(HarnessError::PlanParse(PlanParseFailure::Invariants(errors)));
    }
    debug!(step_count = plan.steps.len(), "parsed plan");
    Ok(plan)
}

/// Check invariants not expressible in the schema:
/// - `goal` is not blank
/// - every `tool` is not blank
/// - step ids are unique
pub fn validate_plan_invariants(plan: &Plan) -> Vec<String> {
    let mut errors = Vec::new();
    if plan.goal.trim().is_empty() {
        errors.push("goal must not be blank".to_string());
    }
    let mut seen = HashSet::new();
    for (index, step) in plan.steps.iter().enumerate() {
        if step.tool.trim().is_empty() {
            errors.push(format!("steps[{index}]: tool must not be blank"));
        }
        if !seen.insert(step.id) {
            errors.push(format!("steps[{index}]: duplicate step id {}", step.id));
        }
    }
    errors
}
