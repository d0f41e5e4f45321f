//! Tool registry.
//!
//! Dispatch goes through a single `invoke(name, args)` capability; the
//! orchestrator never calls a tool implementation directly.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::core::types::Args;
use crate::io::config::ToolSettings;

/// Catalogue entry shown to the planning and step models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    /// Argument shape, e.g. `{"message": "<string>"}`.
    pub args_hint: String,
}

/// Named tool capabilities available for dispatch.
pub trait ToolRegistry {
    fn contains(&self, name: &str) -> bool;

    /// Run `name` with `args` and return its observation text.
    ///
    /// Errors are collaborator failures; a tool that cannot do what was
    /// asked reports it in the observation instead.
    fn invoke(&self, name: &str, args: &Args) -> Result<String>;

    fn descriptors(&self) -> Vec<ToolDescriptor>;
}

impl<T: ToolRegistry + ?Sized> ToolRegistry for &T {
    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }

    fn invoke(&self, name: &str, args: &Args) -> Result<String> {
        (**self).invoke(name, args)
    }

    fn descriptors(&self) -> Vec<ToolDescriptor> {
        (**self).descriptors()
    }
}

type Handler = fn(&ToolSettings, &Args) -> Result<String>;

struct Builtin {
    args_hint: &'static str,
    handler: Handler,
}

/// Built-in tools: `echo`, `summarize` and `file_write`.
pub struct BuiltinTools {
    settings: ToolSettings,
    table: BTreeMap<&'static str, Builtin>,
}

impl BuiltinTools {
    pub fn new(settings: ToolSettings) -> Self {
        let mut table = BTreeMap::new();
        table.insert(
            "echo",
            Builtin {
                args_hint: r#"{"message": "<string>"}"#,
                handler: echo,
            },
        );
        table.insert(
            "summarize",
            Builtin {
                args_hint: r#"{"text": "<string>"}"#,
                handler: summarize,
            },
        );
        table.insert(
            "file_write",
            Builtin {
                args_hint: r#"{"path": "<string>", "content": "<string>"}"#,
                handler: file_write,
            },
        );
        Self { settings, table }
    }
}

impl ToolRegistry for BuiltinTools {
    fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    #[instrument(skip(self, args))]
    fn invoke(&self, name: &str, args: &Args) -> Result<String> {
        let builtin = self
            .table
            .get(name)
            .ok_or_else(|| anyhow!("tool '{name}' is not registered"))?;
        (builtin.handler)(&self.settings, args)
    }

    fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.table
            .iter()
            .map(|(name, builtin)| ToolDescriptor {
                name: (*name).to_string(),
                args_hint: builtin.args_hint.to_string(),
            })
            .collect()
    }
}

/// String arguments pass through; anything else is rendered as JSON.
fn text_arg(args: &Args, key: &str) -> String {
    match args.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn echo(_: &ToolSettings, args: &Args) -> Result<String> {
    Ok(text_arg(args, "message"))
}

fn summarize(settings: &ToolSettings, args: &Args) -> Result<String> {
    let text = text_arg(args, "text");
    let text = text.trim();
    if text.is_empty() {
        return Ok("Error: no text provided.".to_string());
    }
    Ok(text.chars().take(settings.summarize_limit_chars).collect())
}

fn file_write(settings: &ToolSettings, args: &Args) -> Result<String> {
    let raw_path = text_arg(args, "path");
    let relative = raw_path.trim();
    if relative.is_empty() {
        return Ok("Error: no path provided.".to_string());
    }
    if !is_confined(Path::new(relative)) {
        warn!(path = relative, "file_write outside workspace refused");
        return Ok(format!(
            "SECURITY BLOCK: '{relative}' escapes the workspace directory; nothing was written."
        ));
    }

    let target = settings.workspace_dir.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let content = text_arg(args, "content");
    fs::write(&target, &content).with_context(|| format!("write {}", target.display()))?;
    info!(path = %target.display(), bytes = content.len(), "file_write");
    Ok(format!("Wrote {} bytes to {relative}.", content.len()))
}

/// Relative paths made only of normal components stay inside the workspace.
fn is_confined(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Args {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn tools_in(dir: &Path) -> BuiltinTools {
        BuiltinTools::new(ToolSettings {
            workspace_dir: dir.to_path_buf(),
            summarize_limit_chars: 5,
        })
    }

    #[test]
    fn registry_lists_builtins() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tools = tools_in(temp.path());
        assert!(tools.contains("echo"));
        assert!(!tools.contains("search"));
        let names: Vec<String> = tools.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["echo", "file_write", "summarize"]);
    }

    #[test]
    fn echo_returns_message() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tools = tools_in(temp.path());
        let out = tools.invoke("echo", &args(json!({"message": "hi"}))).expect("invoke");
        assert_eq!(out, "hi");
        let out = tools.invoke("echo", &Args::new()).expect("invoke");
        assert_eq!(out, "");
    }

    #[test]
    fn summarize_truncates_by_characters() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tools = tools_in(temp.path());
        let out = tools
            .invoke("summarize", &args(json!({"text": "  héllo wörld  "})))
            .expect("invoke");
        assert_eq!(out, "héllo");
        let out = tools
            .invoke("summarize", &args(json!({"text": "   "})))
            .expect("invoke");
        assert_eq!(out, "Error: no text provided.");
    }

    #[test]
    fn file_write_stays_inside_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tools = tools_in(temp.path());
        let out = tools
            .invoke(
                "file_write",
                &args(json!({"path": "notes/a.txt", "content": "hello"})),
            )
            .expect("invoke");
        assert_eq!(out, "Wrote 5 bytes to notes/a.txt.");
        let written = fs::read_to_string(temp.path().join("notes/a.txt")).expect("read");
        assert_eq!(written, "hello");
    }

    #[test]
    fn file_write_blocks_escapes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tools = tools_in(temp.path());
        for path in ["/etc/passwd", "../outside.txt", "a/../../b.txt"] {
            let out = tools
                .invoke("file_write", &args(json!({"path": path, "content": "x"})))
                .expect("invoke");
            assert!(out.starts_with("SECURITY BLOCK"), "{path}: {out}");
        }
        let out = tools
            .invoke("file_write", &args(json!({"content": "x"})))
            .expect("invoke");
        assert_eq!(out, "Error: no path provided.");
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(tools_in(temp.path()).invoke("rm", &Args::new()).is_err());
    }
}
