//! Subagent lifecycle manager.
//!
//! Owns every tracked [`Subagent`] and enforces the concurrency cap, the
//! per-subagent timeout and the recursion guard.

use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use tracing::{debug, info, warn};

use super::error::SubagentError;
use super::id::generate_id;
use super::launcher::{CurrentExecutable, ExecutableResolver, launch, signal_group};
use super::output::OutputCollector;
use super::types::{StatusReport, Subagent, SubagentStatus};
use super::{
    DEFAULT_MAX_SUBAGENTS, DEFAULT_TIMEOUT_SECS, GRACE_PERIOD, MAX_OUTPUT_BYTES,
    MAX_SUBAGENTS_CEILING, MAX_TIMEOUT_SECS, POLL_INTERVAL,
};
use crate::config::SubagentSettings;

/// Attempts at drawing an id that is not already tracked.
const ID_ATTEMPTS: usize = 8;

/// Clamp a requested cap: below 1 means default, above the ceiling means the ceiling.
pub fn normalize_max_subagents(requested: i64) -> usize {
    if requested < 1 {
        DEFAULT_MAX_SUBAGENTS
    } else {
        usize::try_from(requested).map_or(MAX_SUBAGENTS_CEILING, |n| n.min(MAX_SUBAGENTS_CEILING))
    }
}

/// Clamp a requested timeout in seconds the same way.
pub fn normalize_timeout_secs(requested: i64) -> u64 {
    if requested < 1 {
        DEFAULT_TIMEOUT_SECS
    } else {
        u64::try_from(requested).map_or(MAX_TIMEOUT_SECS, |n| n.min(MAX_TIMEOUT_SECS))
    }
}

/// Supervisor for subagent processes.
///
/// Single-caller: every method takes `&mut self` and nothing runs in the
/// background. Records stay tracked (and count towards the cap) until
/// [`cleanup`](Self::cleanup).
#[derive(Debug)]
pub struct SubagentManager {
    subagents: Vec<Subagent>,
    max_subagents: usize,
    timeout: Duration,
    is_subagent_process: bool,
    resolver: Box<dyn ExecutableResolver>,
}

impl SubagentManager {
    /// Create a manager with clamped limits.
    pub fn new(max_subagents: i64, timeout_secs: i64) -> Self {
        Self {
            subagents: Vec::new(),
            max_subagents: normalize_max_subagents(max_subagents),
            timeout: Duration::from_secs(normalize_timeout_secs(timeout_secs)),
            is_subagent_process: false,
            resolver: Box::new(CurrentExecutable::default()),
        }
    }

    pub fn from_settings(settings: &SubagentSettings) -> Self {
        Self::new(settings.max_subagents, settings.subagent_timeout)
    }

    /// Replace the strategy used to find the executable to re-launch.
    #[must_use]
    pub fn with_resolver(mut self, resolver: impl ExecutableResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Mark this process as a subagent, which disables `spawn`.
    pub fn set_subagent_process(&mut self, is_subagent: bool) {
        self.is_subagent_process = is_subagent;
    }

    pub const fn is_subagent_process(&self) -> bool {
        self.is_subagent_process
    }

    pub const fn max_subagents(&self) -> usize {
        self.max_subagents
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of tracked records, terminal ones included.
    pub fn len(&self) -> usize {
        self.subagents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subagents.is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.subagents
            .iter()
            .filter(|s| s.status == SubagentStatus::Running)
            .count()
    }

    pub fn find(&self, id: &str) -> Option<&Subagent> {
        self.subagents.iter().find(|s| s.id == id)
    }

    pub fn subagents(&self) -> &[Subagent] {
        &self.subagents
    }

    /// Start a subagent for `task` and return its id.
    ///
    /// Refusals are checked in order: empty task, recursion guard, capacity.
    /// A refused or failed spawn leaves no process behind and no record.
    pub fn spawn(&mut self, task: &str, context: Option<&str>) -> Result<String, SubagentError> {
        if task.is_empty() {
            return Err(SubagentError::EmptyTask);
        }
        if self.is_subagent_process {
            warn!("Refusing to spawn from inside a subagent");
            return Err(SubagentError::NestedSpawn);
        }
        if self.subagents.len() >= self.max_subagents {
            return Err(SubagentError::CapacityReached {
                max: self.max_subagents,
            });
        }

        let id = self.unused_id();
        let executable = self.resolver.resolve();
        let context = context.filter(|c| !c.is_empty());
        let mut launched = launch(&executable, task, context)?;

        if let Err(e) = self.subagents.try_reserve(1) {
            signal_group(&mut launched.child, Signal::SIGKILL);
            if let Err(wait_err) = launched.child.wait() {
                warn!(error = %wait_err, "Failed to reap untracked subagent");
            }
            return Err(SubagentError::Bookkeeping(e));
        }

        info!(
            id = %id,
            pid = launched.child.id(),
            executable = %executable.display(),
            "Spawned subagent"
        );

        self.subagents.push(Subagent {
            id: id.clone(),
            child: launched.child,
            output: OutputCollector::new(launched.output, MAX_OUTPUT_BYTES),
            task: task.to_string(),
            context: context.map(str::to_string),
            result: None,
            error: None,
            started_at: Instant::now(),
            status: SubagentStatus::Running,
        });
        Ok(id)
    }

    fn unused_id(&self) -> String {
        let mut id = generate_id();
        for _ in 1..ID_ATTEMPTS {
            if self.find(&id).is_none() {
                break;
            }
            debug!(id = %id, "Subagent id collision, drawing again");
            id = generate_id();
        }
        id
    }

    /// Run one check on every running record.
    ///
    /// Returns how many records reached a terminal state during this call.
    pub fn poll_all(&mut self) -> usize {
        let timeout = self.timeout;
        self.subagents
            .iter_mut()
            .map(|s| s.check(timeout))
            .filter(|&finished| finished)
            .count()
    }

    /// Current state of subagent `id`.
    ///
    /// With `wait`, blocks in [`POLL_INTERVAL`] steps until the record is
    /// terminal. The wait is bounded by the timeout, which is enforced on each
    /// step. Without `wait`, a single check runs first.
    pub fn get_status(&mut self, id: &str, wait: bool) -> Result<StatusReport, SubagentError> {
        let timeout = self.timeout;
        let subagent = self
            .subagents
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SubagentError::NotFound { id: id.to_string() })?;

        subagent.check(timeout);
        if wait {
            while !subagent.status.is_terminal() {
                std::thread::sleep(POLL_INTERVAL);
                subagent.check(timeout);
            }
        }
        Ok(subagent.report())
    }

    /// Terminate every running subagent and forget all records.
    ///
    /// Running children get SIGTERM, one shared grace period, then SIGKILL.
    /// Every child is reaped before this returns.
    pub fn cleanup(&mut self) {
        if self.subagents.is_empty() {
            return;
        }

        let mut signalled = 0usize;
        for subagent in &mut self.subagents {
            if subagent.status == SubagentStatus::Running {
                signal_group(&mut subagent.child, Signal::SIGTERM);
                signalled += 1;
            }
        }
        if signalled > 0 {
            debug!(count = signalled, "Sent SIGTERM to running subagents");
            std::thread::sleep(GRACE_PERIOD);
        }

        for mut subagent in self.subagents.drain(..) {
            if subagent.status != SubagentStatus::Running {
                continue;
            }
            if matches!(subagent.child.try_wait(), Ok(None)) {
                debug!(id = %subagent.id, "Subagent ignored SIGTERM, killing");
            }
            // Also takes down anything the child left in its group.
            signal_group(&mut subagent.child, Signal::SIGKILL);
            if let Err(e) = subagent.child.wait() {
                debug!(id = %subagent.id, error = %e, "Subagent already reaped");
            }
        }

        info!(count = signalled, "Cleaned up subagents");
    }
}

impl Drop for SubagentManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::subagent::FixedExecutable;

    #[test]
    fn limits_below_one_fall_back_to_defaults() {
        assert_eq!(normalize_max_subagents(0), DEFAULT_MAX_SUBAGENTS);
        assert_eq!(normalize_max_subagents(-4), DEFAULT_MAX_SUBAGENTS);
        assert_eq!(normalize_timeout_secs(0), DEFAULT_TIMEOUT_SECS);
        assert_eq!(normalize_timeout_secs(i64::MIN), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn limits_above_ceiling_are_capped() {
        assert_eq!(normalize_max_subagents(21), MAX_SUBAGENTS_CEILING);
        assert_eq!(normalize_max_subagents(i64::MAX), MAX_SUBAGENTS_CEILING);
        assert_eq!(normalize_timeout_secs(3601), MAX_TIMEOUT_SECS);
    }

    #[test]
    fn limits_in_range_are_kept() {
        assert_eq!(normalize_max_subagents(1), 1);
        assert_eq!(normalize_max_subagents(20), 20);
        assert_eq!(normalize_timeout_secs(1), 1);
        assert_eq!(normalize_timeout_secs(3600), 3600);
    }

    #[test]
    fn new_manager_is_empty_and_not_nested() {
        let manager = SubagentManager::new(0, 0);
        assert!(manager.is_empty());
        assert!(!manager.is_subagent_process());
        assert_eq!(manager.max_subagents(), 5);
        assert_eq!(manager.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn empty_task_is_refused_before_anything_else() {
        let mut manager = SubagentManager::new(1, 1);
        manager.set_subagent_process(true);
        let err = manager.spawn("", None).unwrap_err();
        assert!(matches!(err, SubagentError::EmptyTask));
    }

    #[test]
    fn nested_spawn_is_refused() {
        let mut manager = SubagentManager::new(5, 10);
        manager.set_subagent_process(true);
        let err = manager.spawn("echo hi", None).unwrap_err();
        assert!(matches!(err, SubagentError::NestedSpawn));
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn launch_failure_leaves_no_record() {
        let mut manager = SubagentManager::new(5, 10)
            .with_resolver(FixedExecutable::new("/nonexistent/delegate-test-binary"));
        let err = manager.spawn("echo hi", None).unwrap_err();
        assert!(matches!(err, SubagentError::Launch { .. }));
        assert!(manager.is_empty());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let mut manager = SubagentManager::new(5, 10);
        let err = manager.get_status("0000000000000000", false).unwrap_err();
        assert!(matches!(err, SubagentError::NotFound { .. }));
    }

    #[test]
    fn cleanup_on_empty_manager_is_noop() {
        let mut manager = SubagentManager::new(5, 10);
        manager.cleanup();
        manager.cleanup();
        assert!(manager.is_empty());
        assert_eq!(manager.poll_all(), 0);
    }
}
