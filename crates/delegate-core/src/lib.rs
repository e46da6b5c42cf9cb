//! `delegate` Core Library
//!
//! Shared functionality for `delegate` components:
//! - Subagent process supervision (spawn, poll, wait, cleanup)
//! - Configuration resolution and hierarchy
//! - Tracing initialisation
//! - Common error types

pub mod config;
pub mod error;
pub mod subagent;
pub mod tracing_init;

pub use config::{Config, SubagentSettings};
pub use error::{Error, Result};
pub use subagent::{StatusReport, SubagentError, SubagentManager, SubagentStatus};
