//! delegate CLI Library
//!
//! Tool-call dispatch for subagents, the subagent child mode, and the
//! `run` command used by the `delegate` binary.

pub mod child;
pub mod run_cmd;
pub mod tool;
