//! Starting subagent processes.
//!
//! A subagent is this same program re-executed as
//! `<exe> --subagent --task <task> [--context <context>]`, with stdin closed
//! and stdout and stderr both attached to the write end of a single pipe. The
//! child becomes the leader of a new process group so that timeout and
//! cleanup signals reach anything it starts.

use std::ffi::OsString;
use std::fmt;
use std::io::{self, PipeReader};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::{debug, warn};

use super::error::SubagentError;

/// Binary name used when the running executable cannot be introspected.
pub const DEFAULT_PROGRAM_NAME: &str = "delegate";

/// Resolves the executable to start for a subagent.
pub trait ExecutableResolver: fmt::Debug + Send + Sync {
    fn resolve(&self) -> PathBuf;
}

/// Resolves to the running executable.
///
/// Falls back to `<cwd>/<program>` when it exists and is executable, and to
/// `./<program>` otherwise.
#[derive(Debug, Clone)]
pub struct CurrentExecutable {
    program: String,
}

impl CurrentExecutable {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CurrentExecutable {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM_NAME)
    }
}

impl ExecutableResolver for CurrentExecutable {
    fn resolve(&self) -> PathBuf {
        match std::env::current_exe() {
            Ok(path) => return path,
            Err(e) => debug!(error = %e, "current_exe unavailable, trying working directory"),
        }

        if let Ok(cwd) = std::env::current_dir() {
            let candidate = cwd.join(&self.program);
            if is_executable(&candidate) {
                return candidate;
            }
        }

        Path::new(".").join(&self.program)
    }
}

/// Always resolves to the same path.
#[derive(Debug, Clone)]
pub struct FixedExecutable(PathBuf);

impl FixedExecutable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }
}

impl ExecutableResolver for FixedExecutable {
    fn resolve(&self) -> PathBuf {
        self.0.clone()
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

/// Argument vector for a subagent child. An empty context is omitted.
pub fn subagent_args(task: &str, context: Option<&str>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--subagent".into(), "--task".into(), task.into()];
    if let Some(context) = context.filter(|c| !c.is_empty()) {
        args.push("--context".into());
        args.push(context.into());
    }
    args
}

/// A freshly started child and the read end of its output pipe.
pub(crate) struct Launched {
    pub child: Child,
    pub output: PipeReader,
}

/// Start `executable` as a subagent for `task`.
///
/// On failure every descriptor acquired so far is closed before returning.
pub(crate) fn launch(
    executable: &Path,
    task: &str,
    context: Option<&str>,
) -> Result<Launched, SubagentError> {
    let (reader, writer) = io::pipe().map_err(SubagentError::Pipe)?;
    let stderr_writer = writer.try_clone().map_err(SubagentError::Pipe)?;

    let mut command = Command::new(executable);
    command
        .args(subagent_args(task, context))
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(stderr_writer)
        .process_group(0);

    let child = command.spawn().map_err(|source| SubagentError::Launch {
        path: executable.to_path_buf(),
        source,
    })?;
    // The command still owns our copies of the write end; EOF only arrives
    // once they are closed.
    drop(command);

    Ok(Launched {
        child,
        output: reader,
    })
}

/// Process id of `child` as a nix `Pid`.
pub(crate) fn pid_of(child: &Child) -> Option<Pid> {
    i32::try_from(child.id()).ok().map(Pid::from_raw)
}

/// Send `signal` to the process group led by `child`.
///
/// Falls back to signalling only the child when the group is gone. A missing
/// process is not an error: the child may already have exited.
pub(crate) fn signal_group(child: &mut Child, signal: Signal) {
    let Some(pid) = pid_of(child) else {
        return;
    };
    match killpg(pid, signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => {
            warn!(pid = %pid, ?signal, error = %e, "Failed to signal subagent process group");
            if signal == Signal::SIGKILL {
                if let Err(e) = child.kill() {
                    warn!(pid = %pid, error = %e, "Failed to kill subagent");
                }
            }
        }
    }
}
