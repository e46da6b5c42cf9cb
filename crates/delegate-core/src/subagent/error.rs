use std::collections::TryReserveError;
use std::path::PathBuf;

/// Errors from subagent operations.
///
/// Spawn-time refusals (`EmptyTask`, `NestedSpawn`, `CapacityReached`) carry
/// distinct messages so the calling logic can decide whether to wait, retry or
/// avoid nesting. Runtime failures of a child are never errors here: they are
/// reported through [`SubagentStatus`](super::SubagentStatus).
#[derive(Debug, thiserror::Error)]
pub enum SubagentError {
    #[error("Task parameter is required")]
    EmptyTask,

    #[error("Subagents cannot spawn additional subagents")]
    NestedSpawn,

    #[error("Maximum number of concurrent subagents ({max}) reached")]
    CapacityReached { max: usize },

    #[error("Failed to create output pipe: {0}")]
    Pipe(#[source] std::io::Error),

    #[error("Failed to launch subagent executable {path:?}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to track subagent, child process was killed: {0}")]
    Bookkeeping(#[source] TryReserveError),

    #[error("Subagent not found: {id}")]
    NotFound { id: String },
}

impl SubagentError {
    /// Whether the error is a synchronous refusal that created no process.
    pub const fn is_refusal(&self) -> bool {
        matches!(
            self,
            Self::EmptyTask | Self::NestedSpawn | Self::CapacityReached { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusals_have_distinct_messages() {
        let nested = SubagentError::NestedSpawn.to_string();
        let capacity = SubagentError::CapacityReached { max: 5 }.to_string();
        let empty = SubagentError::EmptyTask.to_string();

        assert_ne!(nested, capacity);
        assert_ne!(nested, empty);
        assert_ne!(capacity, empty);
        assert_eq!(
            capacity,
            "Maximum number of concurrent subagents (5) reached"
        );
        assert_eq!(nested, "Subagents cannot spawn additional subagents");
    }

    #[test]
    fn not_found_names_the_id() {
        let err = SubagentError::NotFound {
            id: "deadbeefdeadbeef".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("not found"));
        assert!(text.contains("deadbeefdeadbeef"));
    }

    #[test]
    fn only_validation_errors_are_refusals() {
        assert!(SubagentError::EmptyTask.is_refusal());
        assert!(SubagentError::NestedSpawn.is_refusal());
        assert!(SubagentError::CapacityReached { max: 1 }.is_refusal());
        assert!(!SubagentError::Pipe(std::io::Error::other("x")).is_refusal());
        assert!(
            !SubagentError::NotFound {
                id: String::new()
            }
            .is_refusal()
        );
    }
}
