//! Side-effecting operations: filesystem, git, process execution, prompts.

pub mod config;
pub mod git;
pub mod invoker;
pub mod plans;
pub mod process;
pub mod prompt;
pub mod run_log;
