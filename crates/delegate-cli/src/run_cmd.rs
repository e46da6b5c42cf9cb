//! `delegate run`: delegate tasks to subagents and report their outcomes.
//!
//! User-facing output uses writeln! to the given writer (stdout in the binary).

use std::io::Write;

use clap::Args;
use serde_json::{Value, json};
use tracing::info;

use delegate_core::SubagentManager;

use crate::tool::{SUBAGENT_STATUS_TOOL, SUBAGENT_TOOL, SubagentTools, ToolCall};

/// Arguments for `delegate run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Tasks to delegate, one subagent per task (run with `sh -c`)
    #[arg(required = true, num_args = 1..)]
    pub tasks: Vec<String>,

    /// Context passed to every subagent as DELEGATE_CONTEXT
    #[arg(long)]
    pub context: Option<String>,

    /// Print each tool result as a JSON line instead of plain text
    #[arg(long)]
    pub json: bool,

    /// Report current states once instead of waiting for completion
    #[arg(long)]
    pub no_wait: bool,
}

/// Run every task through the subagent tools and write a report to `out`.
///
/// Returns `true` when every task completed successfully. With `no_wait`,
/// subagents still running are reported as such and count as unsuccessful.
pub fn run(
    manager: &mut SubagentManager,
    args: &RunArgs,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    let mut tools = SubagentTools::new(manager);
    let mut all_ok = true;
    let mut spawned = Vec::with_capacity(args.tasks.len());

    for (index, task) in args.tasks.iter().enumerate() {
        let mut arguments = json!({ "task": task });
        if let Some(context) = &args.context {
            arguments["context"] = json!(context);
        }
        let result = tools.execute(&ToolCall::new(
            format!("spawn-{index}"),
            SUBAGENT_TOOL,
            &arguments,
        ));
        let body = result.json()?;

        if args.json {
            writeln!(out, "{}", result.content)?;
        }
        match body.get("subagent_id").and_then(Value::as_str) {
            Some(id) if result.success => spawned.push((index, id.to_string())),
            _ => {
                all_ok = false;
                if !args.json {
                    writeln!(out, "[task {}] not started: {}", index + 1, error_text(&body))?;
                }
            }
        }
    }

    info!(
        spawned = spawned.len(),
        requested = args.tasks.len(),
        "Delegated tasks"
    );

    for (index, id) in &spawned {
        let result = tools.execute(&ToolCall::new(
            format!("status-{index}"),
            SUBAGENT_STATUS_TOOL,
            &json!({ "subagent_id": id, "wait": !args.no_wait }),
        ));
        let body = result.json()?;
        let status = body.get("status").and_then(Value::as_str).unwrap_or("failed");
        if status != "completed" {
            all_ok = false;
        }

        if args.json {
            writeln!(out, "{}", result.content)?;
            continue;
        }

        writeln!(out, "[task {}] {id} {status}", index + 1)?;
        match status {
            "completed" => {
                let text = body.get("result").and_then(Value::as_str).unwrap_or_default();
                write!(out, "{text}")?;
                if !text.is_empty() && !text.ends_with('\n') {
                    writeln!(out)?;
                }
            }
            "running" => {}
            _ => writeln!(out, "{}", error_text(&body))?,
        }
    }

    Ok(all_ok)
}

fn error_text(body: &Value) -> &str {
    body.get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
}
