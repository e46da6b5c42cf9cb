//! Per-record check cycle: timeout, drain, exit check.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use tracing::{debug, info, warn};

use super::launcher::signal_group;
use super::types::{Subagent, SubagentStatus};
use super::TIMEOUT_ERROR;

impl Subagent {
    /// Advance a running record by one check.
    ///
    /// Returns `true` when the record moved to a terminal state during this
    /// call. Terminal records are left untouched.
    pub(crate) fn check(&mut self, timeout: Duration) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        if self.started_at.elapsed() > timeout {
            self.enforce_timeout(timeout);
            return true;
        }

        if let Err(e) = self.output.drain_available() {
            debug!(id = %self.id, error = %e, "Non-blocking drain failed");
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.handle_exit(status);
                true
            }
            Ok(None) => false,
            Err(e) if e.raw_os_error() == Some(Errno::ECHILD as i32) => {
                debug!(id = %self.id, "Subagent already reaped elsewhere");
                false
            }
            Err(e) => {
                self.fail_check(&e);
                true
            }
        }
    }

    fn enforce_timeout(&mut self, timeout: Duration) {
        warn!(
            id = %self.id,
            pid = self.child.id(),
            timeout_secs = timeout.as_secs(),
            "Subagent exceeded its timeout, killing"
        );
        signal_group(&mut self.child, Signal::SIGKILL);
        if let Err(e) = self.child.wait() {
            warn!(id = %self.id, error = %e, "Failed to reap timed out subagent");
        }
        self.finish_output();

        self.status = SubagentStatus::Timeout;
        self.error = Some(TIMEOUT_ERROR.to_string());
    }

    fn handle_exit(&mut self, status: ExitStatus) {
        // Anything the child left running in its group would hold the pipe
        // open and stall the blocking drain.
        signal_group(&mut self.child, Signal::SIGKILL);
        self.finish_output();

        if status.success() {
            let bytes = self.output.take();
            let result = String::from_utf8(bytes)
                .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
            info!(
                id = %self.id,
                bytes = result.len(),
                elapsed_ms = self.started_at.elapsed().as_millis(),
                "Subagent completed"
            );
            self.status = SubagentStatus::Completed;
            self.result = Some(result);
            return;
        }

        let mut message = if let Some(code) = status.code() {
            format!("Subagent exited with code {code}")
        } else if let Some(signal) = status.signal() {
            format!("Subagent killed by signal {signal}")
        } else {
            "Subagent process failed".to_string()
        };
        if !self.output.is_empty() {
            message.push_str(". Output: ");
            message.push_str(&String::from_utf8_lossy(self.output.as_bytes()));
        }

        info!(id = %self.id, %status, "Subagent failed");
        self.status = SubagentStatus::Failed;
        self.error = Some(message);
    }

    fn fail_check(&mut self, err: &io::Error) {
        warn!(id = %self.id, error = %err, "Failed to check subagent status");
        signal_group(&mut self.child, Signal::SIGKILL);
        self.finish_output();
        self.status = SubagentStatus::Failed;
        self.error = Some(format!("Failed to check subagent status: {err}"));
    }

    fn finish_output(&mut self) {
        if let Err(e) = self.output.drain_to_eof() {
            warn!(id = %self.id, error = %e, "Failed to collect trailing subagent output");
        }
    }
}
