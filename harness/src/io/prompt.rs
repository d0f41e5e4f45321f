//! Message builders for every model call of a request.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::Value;

use crate::core::canonical::canonical_json;
use crate::core::plan_parser::{PLAN_CLOSE_TAG, PLAN_OPEN_TAG};
use crate::core::types::{DYNAMIC_SENTINEL, ExecutionRecord, Message, Plan, Step};
use crate::io::tools::ToolDescriptor;

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const REVIEWER_TEMPLATE: &str = include_str!("prompts/reviewer.md");
const REACT_TEMPLATE: &str = include_str!("prompts/react.md");
const STEP_TEMPLATE: &str = include_str!("prompts/step.md");
const SYNTHESIS_TEMPLATE: &str = include_str!("prompts/synthesis.md");

/// One execution record as shown to the synthesis call.
#[derive(Debug, Serialize)]
struct RecordContext<'a> {
    step_id: i64,
    description: &'a str,
    tool: &'a str,
    args_json: String,
    thought: &'a str,
    observation: &'a str,
    verified: &'static str,
}

impl<'a> RecordContext<'a> {
    fn from_record(record: &'a ExecutionRecord) -> Result<Self> {
        Ok(Self {
            step_id: record.step_id,
            description: &record.description,
            tool: &record.tool,
            args_json: canonical_json(&Value::Object(record.args.clone()))?,
            thought: &record.thought,
            observation: &record.observation,
            verified: if record.verified { "True" } else { "False" },
        })
    }
}

/// Template engine wrapper around minijinja, bound to one tool catalogue.
pub struct PromptEngine {
    env: Environment<'static>,
    tools: Vec<ToolDescriptor>,
}

impl PromptEngine {
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in [
            ("planner", PLANNER_TEMPLATE),
            ("reviewer", REVIEWER_TEMPLATE),
            ("react", REACT_TEMPLATE),
            ("step", STEP_TEMPLATE),
            ("synthesis", SYNTHESIS_TEMPLATE),
        ] {
            env.add_template(name, source)
                .with_context(|| format!("load {name} template"))?;
        }
        Ok(Self { env, tools })
    }

    fn planner_system(&self) -> Result<String> {
        let rendered = self.env.get_template("planner")?.render(context! {
            open_tag => PLAN_OPEN_TAG,
            close_tag => PLAN_CLOSE_TAG,
            dynamic => DYNAMIC_SENTINEL,
            tools => &self.tools,
        })?;
        Ok(rendered)
    }

    /// Routing call: planner system prompt plus the user prompt.
    pub fn planner_messages(&self, prompt: &str) -> Result<Vec<Message>> {
        Ok(vec![
            Message::system(self.planner_system()?),
            Message::user(prompt),
        ])
    }

    /// Safety review of the full committed plan.
    pub fn review_messages(&self, plan: &Plan) -> Result<Vec<Message>> {
        let tool_names: Vec<&str> = self.tools.iter().map(|t| t.name.as_str()).collect();
        let system = self.env.get_template("reviewer")?.render(context! {
            tool_names => tool_names,
        })?;
        let plan_json = serde_json::to_string_pretty(plan).context("serialize plan")?;
        Ok(vec![Message::system(system), Message::user(plan_json)])
    }

    /// One reasoning/action cycle. An absent or empty prior observation is
    /// shown as `None`.
    pub fn step_messages(&self, step: &Step, prior: Option<&str>) -> Result<Vec<Message>> {
        let system = self.env.get_template("react")?.render(context! {
            dynamic => DYNAMIC_SENTINEL,
            tools => &self.tools,
        })?;
        let step_json = serde_json::to_string_pretty(step).context("serialize step")?;
        let user = self.env.get_template("step")?.render(context! {
            step_json => step_json,
            prior => prior.filter(|p| !p.is_empty()).unwrap_or("None"),
        })?;
        Ok(vec![Message::system(system), Message::user(user)])
    }

    /// Synthesis call: the original conversation followed by the verified log.
    pub fn synthesis_messages(
        &self,
        prompt: &str,
        planner_response: &str,
        records: &[ExecutionRecord],
    ) -> Result<Vec<Message>> {
        let records = records
            .iter()
            .map(RecordContext::from_record)
            .collect::<Result<Vec<_>>>()?;
        let log = self.env.get_template("synthesis")?.render(context! {
            records => records,
        })?;
        Ok(vec![
            Message::system(self.planner_system()?),
            Message::user(prompt),
            Message::assistant(planner_response),
            Message::user(log),
        ])
    }
}
