//! Subagent mode: what the binary does when started as
//! `delegate --subagent --task <text> [--context <text>]`.
//!
//! The task runs under `sh -c` with stdout and stderr inherited, so everything
//! it prints lands in the pipe the supervising process reads.

use std::process::{Command, ExitStatus};

use anyhow::{Context, bail};
use tracing::debug;

/// Environment flag marking a process (and its descendants) as a subagent.
pub const SUBAGENT_ENV: &str = "DELEGATE_SUBAGENT";

/// Environment variable carrying the optional context to the task.
pub const CONTEXT_ENV: &str = "DELEGATE_CONTEXT";

/// Whether the environment says this process runs inside a subagent.
pub fn inherited_subagent_flag() -> bool {
    std::env::var(SUBAGENT_ENV).is_ok_and(|v| v == "1")
}

/// Build the command that runs `task`.
pub fn task_command(task: &str, context: Option<&str>) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(task).env(SUBAGENT_ENV, "1");
    match context.filter(|c| !c.is_empty()) {
        Some(context) => cmd.env(CONTEXT_ENV, context),
        None => cmd.env_remove(CONTEXT_ENV),
    };
    cmd
}

/// Run `task` to completion and return the exit code to report.
pub fn run_task(task: &str, context: Option<&str>) -> anyhow::Result<i32> {
    if task.is_empty() {
        bail!("Task parameter is required");
    }

    debug!(task_len = task.len(), has_context = context.is_some(), "Running subagent task");
    let status = task_command(task, context)
        .status()
        .context("Failed to run subagent task")?;
    Ok(exit_code(status))
}

/// Exit code of the task, or 1 when it was killed by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
