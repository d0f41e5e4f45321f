//! End-to-end request lifecycle against scripted models and tools.

use harness::core::merkle::MerkleCommitment;
use harness::core::state::Phase;
use harness::core::types::{Plan, Role};
use harness::error::{ActionParseFailure, HarnessError, IntegrityViolation, Section};
use harness::orchestrator::{DISCARD_NOTICE, ExecutedRun, Orchestrator, REJECTION_NOTICE};
use harness::test_support::{
    RecordingTools, ScriptedModel, plan, plan_block, react_response, step,
};
use serde_json::json;

type TestOrchestrator = Orchestrator<ScriptedModel, ScriptedModel, RecordingTools>;

fn orchestrator(
    upstream: Vec<String>,
    downstream: Vec<String>,
    tools: &[&str],
) -> TestOrchestrator {
    Orchestrator::new(
        ScriptedModel::new(upstream),
        ScriptedModel::new(downstream),
        RecordingTools::new(tools),
    )
    .expect("orchestrator")
}

fn echo_plan() -> Plan {
    plan(
        "say hi",
        vec![step(1, "echo", json!({"message": "hi"}), "say hi")],
    )
}

#[test]
fn single_echo_step_is_synthesized() {
    let p = echo_plan();
    let orch = orchestrator(
        vec![plan_block(&p), "The tool said hi.".to_string()],
        vec![
            "SAFE".to_string(),
            react_response("Echo the greeting.", "echo", json!({"message": "hi"})),
        ],
        &["echo"],
    );

    let outcome = orch.run("Please say hi").expect("run");

    assert_eq!(outcome.terminal, Phase::Synthesized);
    assert_eq!(outcome.output, "The tool said hi.");
    assert_eq!(
        outcome.trace,
        [
            Phase::Received,
            Phase::Route,
            Phase::PlanParsed,
            Phase::Committed,
            Phase::SafetyChecked,
            Phase::Executing,
            Phase::Executed,
            Phase::PostVerified,
            Phase::Synthesized,
        ]
    );
    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    assert_eq!(record.observation, "hi");
    assert_eq!(record.thought, "Echo the greeting.");
    assert!(record.verified);

    let committed = outcome.commitment.as_ref().expect("commitment");
    assert!(committed.verify_leaf(0, &p.steps[0]));
    let rebuilt = MerkleCommitment::build(&p.steps).expect("build");
    assert_eq!(rebuilt.root(), committed.root());

    let synthesis = orch.upstream().requests().pop().expect("synthesis request");
    assert_eq!(synthesis.len(), 4);
    assert_eq!(synthesis[1].content, "Please say hi");
    assert_eq!(synthesis[2].role, Role::Assistant);
    assert!(synthesis[3].content.contains("Observation: hi"));
}

#[test]
fn step_mutated_before_verification_halts_without_dispatch() {
    let p = echo_plan();
    let commitment = MerkleCommitment::build(&p.steps).expect("build");
    let mut tampered = p.clone();
    tampered.steps[0].tool = "rm".to_string();

    let orch = orchestrator(vec![], vec![], &["echo", "rm"]);
    let err = orch
        .execute_plan(&tampered, &commitment)
        .expect_err("leaf mismatch");

    assert!(matches!(
        err,
        HarnessError::Integrity(IntegrityViolation::LeafMismatch {
            index: 0,
            step_id: 1
        })
    ));
    assert_eq!(orch.downstream().call_count(), 0);
    assert!(orch.tools().calls().is_empty());
}

#[test]
fn proposed_tool_switch_halts_before_side_effects() {
    let p = echo_plan();
    let orch = orchestrator(
        vec![plan_block(&p)],
        vec![
            "SAFE".to_string(),
            react_response(
                "Better to write a file.",
                "file_write",
                json!({"path": "/tmp/x", "content": "hi"}),
            ),
        ],
        &["echo", "file_write"],
    );

    let outcome = orch.run("Please say hi").expect("run");

    assert_eq!(outcome.terminal, Phase::HaltedIntegrity);
    assert!(matches!(
        outcome.halt,
        Some(HarnessError::Integrity(IntegrityViolation::ToolMismatch { .. }))
    ));
    assert!(outcome.output.contains("'echo'"));
    assert!(outcome.output.contains("'file_write'"));
    assert!(outcome.records.is_empty());
    assert!(orch.tools().calls().is_empty());
    // No synthesis after a halt.
    assert_eq!(orch.upstream().call_count(), 1);
}

#[test]
fn unsafe_review_rejects_without_executing() {
    let p = echo_plan();
    let orch = orchestrator(
        vec![plan_block(&p)],
        vec!["UNSAFE: the greeting hides an exfiltration channel".to_string()],
        &["echo"],
    );

    let outcome = orch.run("Please say hi").expect("run");

    assert_eq!(outcome.terminal, Phase::Rejected);
    assert_eq!(outcome.output, REJECTION_NOTICE);
    assert_eq!(
        outcome.rejection_reason.as_deref(),
        Some("UNSAFE: the greeting hides an exfiltration channel")
    );
    assert!(!outcome.visited(Phase::Executing));
    assert!(outcome.commitment.is_some());
    assert_eq!(orch.downstream().call_count(), 1);
    assert!(orch.tools().calls().is_empty());
}

#[test]
fn missing_thought_aborts_the_loop_at_that_step() {
    let p = plan(
        "two steps",
        vec![
            step(1, "echo", json!({"message": "one"}), "first"),
            step(2, "echo", json!({"message": "two"}), "second"),
            step(3, "echo", json!({"message": "three"}), "third"),
        ],
    );
    let orch = orchestrator(
        vec![plan_block(&p)],
        vec![
            "SAFE".to_string(),
            react_response("first", "echo", json!({"message": "one"})),
            "Action: echo\nArgs: {\"message\": \"two\"}".to_string(),
            react_response("third", "echo", json!({"message": "three"})),
        ],
        &["echo"],
    );

    let outcome = orch.run("count").expect("run");

    assert_eq!(outcome.terminal, Phase::HaltedActionParse);
    assert!(matches!(
        outcome.halt,
        Some(HarnessError::ReActParse {
            failure: ActionParseFailure::MissingSection(Section::Thought),
            ..
        })
    ));
    assert!(outcome.records.is_empty());
    assert_eq!(orch.tools().calls().len(), 1);
    // Review plus two step calls; step three is never attempted.
    assert_eq!(orch.downstream().call_count(), 3);
    assert_eq!(orch.downstream().remaining(), 1);
}

#[test]
fn plan_tampered_after_execution_is_discarded() {
    let p = echo_plan();
    let orch = orchestrator(vec!["unused synthesis".to_string()], vec![], &["echo"]);
    let commitment = MerkleCommitment::build(&p.steps).expect("build");
    let mut tampered = p.clone();
    tampered.steps[0]
        .args
        .insert("message".to_string(), json!("bye"));
    let records = vec![harness::core::types::ExecutionRecord {
        step_id: 1,
        tool: "echo".to_string(),
        args: p.steps[0].args.clone(),
        description: "say hi".to_string(),
        thought: "t".to_string(),
        observation: "hi".to_string(),
        verified: true,
    }];

    let outcome = orch
        .finalize(ExecutedRun {
            prompt: "Please say hi",
            response: "plan text",
            plan: tampered,
            commitment,
            records,
            trace: vec![Phase::Executed],
        })
        .expect("finalize");

    assert_eq!(outcome.terminal, Phase::Discarded);
    assert_eq!(outcome.output, DISCARD_NOTICE);
    assert_eq!(
        outcome.trace,
        [Phase::Executed, Phase::PostVerified, Phase::Discarded]
    );
    assert!(outcome.records.is_empty());
    assert!(matches!(
        outcome.halt,
        Some(HarnessError::Integrity(IntegrityViolation::RootMismatch { .. }))
    ));
    assert_eq!(orch.upstream().call_count(), 0);
}

#[test]
fn response_without_plan_block_is_returned_verbatim() {
    let orch = orchestrator(
        vec!["Paris is the capital of France.".to_string()],
        vec![],
        &["echo"],
    );

    let outcome = orch.run("Capital of France?").expect("run");

    assert_eq!(outcome.terminal, Phase::DirectResponse);
    assert_eq!(outcome.output, "Paris is the capital of France.");
    assert_eq!(
        outcome.trace,
        [Phase::Received, Phase::Route, Phase::DirectResponse]
    );
    assert!(outcome.plan.is_none());
    assert_eq!(orch.downstream().call_count(), 0);
}

#[test]
fn unregistered_planned_tool_halts() {
    let p = plan(
        "search",
        vec![step(1, "search", json!({"query": "rust"}), "look it up")],
    );
    let orch = orchestrator(
        vec![plan_block(&p)],
        vec![
            "SAFE".to_string(),
            react_response("search it", "search", json!({"query": "rust"})),
        ],
        &["echo"],
    );

    let outcome = orch.run("find rust").expect("run");

    assert_eq!(outcome.terminal, Phase::HaltedToolMissing);
    assert!(matches!(
        outcome.halt,
        Some(HarnessError::ToolNotFound { ref tool }) if tool == "search"
    ));
    assert!(orch.tools().calls().is_empty());
}

#[test]
fn invalid_plan_block_halts_before_commitment() {
    let orch = orchestrator(
        vec!["<planthenexecute>{\"goal\": \"g\", \"steps\": []}</planthenexecute>".to_string()],
        vec![],
        &["echo"],
    );

    let outcome = orch.run("do it").expect("run");

    assert_eq!(outcome.terminal, Phase::HaltedPlanParse);
    assert!(outcome.commitment.is_none());
    assert!(matches!(outcome.halt, Some(HarnessError::PlanParse(_))));
    assert_eq!(orch.downstream().call_count(), 0);
}

#[test]
fn dynamic_argument_is_filled_from_prior_observation() {
    let p = plan(
        "echo then summarize",
        vec![
            step(1, "echo", json!({"message": "long text"}), "produce text"),
            step(2, "summarize", json!({"text": "<DYNAMIC>"}), "summarize it"),
        ],
    );
    let orch = orchestrator(
        vec![plan_block(&p), "Summary done.".to_string()],
        vec![
            "safe".to_string(),
            react_response("echo", "echo", json!({"message": "long text"})),
            react_response("summarize prior", "summarize", json!({"text": "long text"})),
        ],
        &["echo", "summarize"],
    );

    let outcome = orch.run("summarize").expect("run");

    assert_eq!(outcome.terminal, Phase::Synthesized);
    let calls = orch.tools().calls();
    assert_eq!(calls[1].0, "summarize");
    assert_eq!(calls[1].1["text"], "long text");
    assert_eq!(outcome.records[1].observation, "ok:summarize");

    let requests = orch.downstream().requests();
    assert!(requests[1][1].content.ends_with("Prior observation: None"));
    assert!(requests[2][1].content.ends_with("Prior observation: long text"));
}

#[test]
fn injected_argument_halts() {
    let p = echo_plan();
    let orch = orchestrator(
        vec![plan_block(&p)],
        vec![
            "SAFE".to_string(),
            react_response("echo", "echo", json!({"message": "hi", "loud": true})),
        ],
        &["echo"],
    );

    let outcome = orch.run("say hi").expect("run");

    assert_eq!(outcome.terminal, Phase::HaltedIntegrity);
    assert!(matches!(
        outcome.halt,
        Some(HarnessError::Integrity(IntegrityViolation::ArgumentInjected { ref key })) if key == "loud"
    ));
}
