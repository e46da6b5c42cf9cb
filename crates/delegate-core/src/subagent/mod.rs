//! Subagent supervision: delegating a task to a child copy of this program.
//!
//! This module provides the process-backed infrastructure used by the tool
//! dispatcher to run delegated work outside the current session:
//!
//! - [`SubagentManager`]: owns every tracked subagent, the concurrency cap, the
//!   timeout budget and the recursion guard. Exposes `spawn`, `poll_all`,
//!   `get_status` and `cleanup`.
//! - [`launcher`]: builds the child argument vector, resolves the executable
//!   (behind [`ExecutableResolver`]) and starts the child with stdout and
//!   stderr merged into one pipe.
//! - [`output`]: non-blocking and blocking pipe drains with a fixed cap.
//! - `poller`: the per-record timeout/drain/exit-check cycle shared by
//!   `poll_all` and `get_status`.
//!
//! There is no background thread. Child state only advances while the caller
//! is inside one of the manager's methods, and `get_status(.., true)` is the
//! only call that sleeps.

use std::time::Duration;

mod error;
pub mod id;
pub mod launcher;
pub mod manager;
pub mod output;
mod poller;
mod types;

pub use error::SubagentError;
pub use launcher::{CurrentExecutable, ExecutableResolver, FixedExecutable};
pub use manager::SubagentManager;
pub use types::{StatusReport, Subagent, SubagentStatus};

/// Default maximum number of tracked subagents.
pub const DEFAULT_MAX_SUBAGENTS: usize = 5;

/// Absolute maximum number of tracked subagents.
pub const MAX_SUBAGENTS_CEILING: usize = 20;

/// Default per-subagent timeout in seconds (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Maximum per-subagent timeout in seconds (1 hour).
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Maximum captured output per subagent (128 KiB). Excess is dropped.
pub const MAX_OUTPUT_BYTES: usize = 128 * 1024;

/// Sleep between checks while blocking in `get_status`.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grace period between SIGTERM and SIGKILL during cleanup.
pub const GRACE_PERIOD: Duration = Duration::from_millis(100);

/// Error text recorded on a subagent killed for exceeding its budget.
pub const TIMEOUT_ERROR: &str = "Subagent execution timed out";
