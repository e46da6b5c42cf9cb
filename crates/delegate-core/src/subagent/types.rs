use std::fmt;
use std::process::Child;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::output::OutputCollector;

/// Lifecycle state of a subagent.
///
/// `Running` is the only non-terminal state; a record never leaves a terminal
/// state once it reaches one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubagentStatus {
    Running,
    Completed,
    Failed,
    Timeout,
}

impl SubagentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for SubagentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a subagent's state, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: SubagentStatus,
    /// Captured output, present only when `status` is `Completed`.
    pub result: Option<String>,
    /// Failure description, present only when `status` is `Failed` or `Timeout`.
    pub error: Option<String>,
}

/// One delegated unit of work and the child process running it.
#[derive(Debug)]
pub struct Subagent {
    pub(crate) id: String,
    pub(crate) child: Child,
    pub(crate) output: OutputCollector,
    pub(crate) task: String,
    pub(crate) context: Option<String>,
    pub(crate) result: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) started_at: Instant,
    pub(crate) status: SubagentStatus,
}

impl Subagent {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub const fn status(&self) -> SubagentStatus {
        self.status
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Bytes captured so far from a running subagent.
    pub const fn output_len(&self) -> usize {
        self.output.len()
    }

    /// Independent copy of the current state.
    pub fn report(&self) -> StatusReport {
        StatusReport {
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}
