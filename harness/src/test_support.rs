//! Test-only builders and scripted collaborators.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::core::types::{Args, Message, ParsedAction, Plan, Step};
use crate::io::model::ModelClient;
use crate::io::tools::{ToolDescriptor, ToolRegistry};

fn object(value: Value) -> Args {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn step(id: i64, tool: &str, args: Value, description: &str) -> Step {
    Step {
        id,
        tool: tool.to_string(),
        args: object(args),
        description: description.to_string(),
    }
}

/// Proposed action with a placeholder thought.
pub fn action(tool: &str, args: Value) -> ParsedAction {
    ParsedAction {
        thought: "test thought".to_string(),
        tool: tool.to_string(),
        args: object(args),
    }
}

pub fn plan(goal: &str, steps: Vec<Step>) -> Plan {
    Plan {
        goal: goal.to_string(),
        steps,
    }
}

/// Planner response carrying `plan` inside a plan block.
pub fn plan_block(plan: &Plan) -> String {
    let json = serde_json::to_string_pretty(plan).expect("serialize plan");
    format!("I will use tools for this.\n<planthenexecute>\n{json}\n</planthenexecute>")
}

/// Step response in the three-section format.
pub fn react_response(thought: &str, tool: &str, args: Value) -> String {
    format!("Thought: {thought}\nAction: {tool}\nArgs: {args}")
}

/// Model returning queued responses in order and recording every request.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: RefCell<VecDeque<String>>,
    requests: RefCell<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: RefCell::new(responses.into_iter().map(Into::into).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl ModelClient for ScriptedModel {
    fn complete(&self, messages: &[Message]) -> Result<String> {
        self.requests.borrow_mut().push(messages.to_vec());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted model has no responses left"))
    }
}

/// Registry of named fake tools. `echo` returns its message; every other
/// tool returns `ok:<name>`.
#[derive(Debug, Default)]
pub struct RecordingTools {
    names: Vec<String>,
    calls: RefCell<Vec<(String, Args)>>,
}

impl RecordingTools {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Args)> {
        self.calls.borrow().clone()
    }
}

impl ToolRegistry for RecordingTools {
    fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    fn invoke(&self, name: &str, args: &Args) -> Result<String> {
        if !self.contains(name) {
            return Err(anyhow!("tool '{name}' is not registered"));
        }
        self.calls
            .borrow_mut()
            .push((name.to_string(), args.clone()));
        if name == "echo" {
            return Ok(args
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string());
        }
        Ok(format!("ok:{name}"))
    }

    fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.names
            .iter()
            .map(|name| ToolDescriptor {
                name: name.clone(),
                args_hint: "{}".to_string(),
            })
            .collect()
    }
}
