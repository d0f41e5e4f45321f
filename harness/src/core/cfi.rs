//! Control-flow integrity gate.
//!
//! The committed plan is the authorized program. A proposed action may only
//! realize its committed step: same tool, same fixed arguments, and values of
//! its own choosing solely where the plan holds the dynamic sentinel.

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::types::{ParsedAction, Step, is_dynamic};
use crate::error::IntegrityViolation;

/// Check `action` against the committed `step`.
///
/// Checks run in order (tool, argument fidelity, injected keys) and the first
/// violation is returned.
pub fn check_action(step: &Step, action: &ParsedAction) -> Result<(), IntegrityViolation> {
    if action.tool != step.tool {
        warn!(expected = %step.tool, actual = %action.tool, "cfi tool mismatch");
        return Err(IntegrityViolation::ToolMismatch {
            expected: step.tool.clone(),
            actual: action.tool.clone(),
        });
    }

    for (key, planned) in &step.args {
        if is_dynamic(planned) {
            continue;
        }
        let executed = action.args.get(key).cloned().unwrap_or(Value::Null);
        if executed != *planned {
            warn!(key = %key, "cfi argument mutated");
            return Err(IntegrityViolation::ArgumentMutated {
                key: key.clone(),
                planned: planned.clone(),
                executed,
            });
        }
    }

    if let Some(key) = action.args.keys().find(|key| !step.args.contains_key(*key)) {
        warn!(key = %key, "cfi argument injected");
        return Err(IntegrityViolation::ArgumentInjected { key: key.clone() });
    }

    debug!(step_id = step.id, tool = %step.tool, "cfi check passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{action, step};
    use serde_json::json;

    fn write_step() -> Step {
        step(
            1,
            "file_write",
            json!({"path": "a.txt", "content": "<DYNAMIC>"}),
            "write results",
        )
    }

    #[test]
    fn dynamic_argument_accepts_any_value() {
        let step = write_step();
        let proposed = action("file_write", json!({"path": "a.txt", "content": "anything\nat all"}));
        assert_eq!(check_action(&step, &proposed), Ok(()));

        let structured = action("file_write", json!({"path": "a.txt", "content": {"nested": [1, 2]}}));
        assert_eq!(check_action(&step, &structured), Ok(()));
    }

    #[test]
    fn fixed_argument_change_is_mutation() {
        let proposed = action("file_write", json!({"path": "b.txt", "content": "x"}));
        assert_eq!(
            check_action(&write_step(), &proposed),
            Err(IntegrityViolation::ArgumentMutated {
                key: "path".to_string(),
                planned: json!("a.txt"),
                executed: json!("b.txt"),
            })
        );
    }

    #[test]
    fn dropped_fixed_argument_is_mutation() {
        let proposed = action("file_write", json!({"content": "x"}));
        assert_eq!(
            check_action(&write_step(), &proposed),
            Err(IntegrityViolation::ArgumentMutated {
                key: "path".to_string(),
                planned: json!("a.txt"),
                executed: Value::Null,
            })
        );
    }

    #[test]
    fn extra_key_is_injection() {
        let proposed = action(
            "file_write",
            json!({"path": "a.txt", "content": "x", "mode": "append"}),
        );
        assert_eq!(
            check_action(&write_step(), &proposed),
            Err(IntegrityViolation::ArgumentInjected {
                key: "mode".to_string()
            })
        );
    }

    #[test]
    fn tool_mismatch_is_checked_first() {
        let step = step(1, "echo", json!({"message": "safe"}), "safe step");
        let proposed = action("file_write", json!({"path": "/etc/passwd", "content": "root"}));
        assert_eq!(
            check_action(&step, &proposed),
            Err(IntegrityViolation::ToolMismatch {
                expected: "echo".to_string(),
                actual: "file_write".to_string(),
            })
        );
    }

    #[test]
    fn tool_names_match_exactly() {
        let step = step(1, "echo", json!({}), "echo");
        let proposed = action("Echo", json!({}));
        assert!(matches!(
            check_action(&step, &proposed),
            Err(IntegrityViolation::ToolMismatch { .. })
        ));
    }

    #[test]
    fn nested_fixed_arguments_compare_structurally() {
        let step = step(
            1,
            "http_post",
            json!({"url": "https://example.com", "payload": {"a": 1, "b": [true]}}),
            "post",
        );
        let same = action(
            "http_post",
            json!({"payload": {"b": [true], "a": 1}, "url": "https://example.com"}),
        );
        assert_eq!(check_action(&step, &same), Ok(()));

        let changed = action(
            "http_post",
            json!({"payload": {"a": 2, "b": [true]}, "url": "https://example.com"}),
        );
        assert!(matches!(
            check_action(&step, &changed),
            Err(IntegrityViolation::ArgumentMutated { key, .. }) if key == "payload"
        ));
    }
}
