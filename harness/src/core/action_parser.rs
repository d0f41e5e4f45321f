//! Per-step response grammar.
//!
//! ```text
//! Thought: <reasoning, may span lines>
//! Action: <single tool-name token>
//! Args: <JSON object, optionally inside a fenced code block>
//! ```
//!
//! Section markers are recognised at the start of a line. Each failure mode
//! has its own [`ActionParseFailure`] branch.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::core::types::{Args, ParsedAction};
use crate::error::{ActionParseFailure, HarnessError, Section};

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(Thought|Action|Args)[ \t]*:").unwrap());

static TOOL_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+$").unwrap());

#[derive(Debug, Clone, Copy)]
struct Marker {
    start: usize,
    end: usize,
}

/// Parse a reasoning/action response into a [`ParsedAction`].
pub fn parse_action(text: &str) -> Result<ParsedAction, HarnessError> {
    let mut thought = None;
    let mut action = None;
    let mut args = None;
    for caps in MARKER_RE.captures_iter(text) {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let slot = match label.as_str() {
            "Thought" => &mut thought,
            "Action" => &mut action,
            _ => &mut args,
        };
        if slot.is_none() {
            *slot = Some(Marker {
                start: whole.start(),
                end: whole.end(),
            });
        }
    }

    let thought = thought.ok_or_else(|| missing(Section::Thought, text))?;
    let action = action.ok_or_else(|| missing(Section::Action, text))?;
    let args = args.ok_or_else(|| missing(Section::Args, text))?;
    if !(thought.start < action.start && action.start < args.start) {
        return Err(fail(ActionParseFailure::OutOfOrder, text));
    }

    let thought_text = text[thought.end..action.start].trim();
    if thought_text.is_empty() {
        return Err(fail(ActionParseFailure::EmptySection(Section::Thought), text));
    }

    let tool = text[action.end..args.start].trim();
    if tool.is_empty() {
        return Err(fail(ActionParseFailure::EmptySection(Section::Action), text));
    }
    if !TOOL_TOKEN_RE.is_match(tool) {
        return Err(fail(
            ActionParseFailure::InvalidToolToken(tool.to_string()),
            text,
        ));
    }

    let args_raw = text[args.end..].trim();
    if args_raw.is_empty() {
        return Err(fail(ActionParseFailure::EmptySection(Section::Args), text));
    }

    Ok(ParsedAction {
        thought: thought_text.to_string(),
        tool: tool.to_string(),
        args: decode_args(args_raw)?,
    })
}

/// Decode the arguments section: strip an optional code fence, keep the span
/// from the first `{` to the last `}`, then decode JSON that may contain
/// literal control characters inside strings.
fn decode_args(raw: &str) -> Result<Args, HarnessError> {
    let body = strip_code_fence(raw).ok_or_else(|| fail(ActionParseFailure::UnterminatedFence, raw))?;
    let lenient = escape_control_chars_in_strings(object_span(body));
    let value: Value = serde_json::from_str(&lenient)
        .map_err(|err| fail(ActionParseFailure::MalformedJson(err.to_string()), raw))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(fail(ActionParseFailure::NotAnObject, raw)),
    }
}

/// Returns the fenced body, the input itself when unfenced, or `None` when
/// the fence is never closed.
fn strip_code_fence(raw: &str) -> Option<&str> {
    let Some(rest) = raw.strip_prefix("```") else {
        return Some(raw);
    };
    // Info string, e.g. ```json
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    let end = rest.rfind("```")?;
    Some(rest[..end].trim())
}

/// Prose around the object is dropped. Without a brace pair the body is
/// returned unchanged so non-object payloads still decode and get refused.
fn object_span(body: &str) -> &str {
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    }
}

fn escape_control_chars_in_strings(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in body.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn missing(section: Section, raw: &str) -> HarnessError {
    fail(ActionParseFailure::MissingSection(section), raw)
}

fn fail(failure: ActionParseFailure, raw: &str) -> HarnessError {
    HarnessError::ReActParse {
        failure,
        raw: raw.to_string(),
    }
}
