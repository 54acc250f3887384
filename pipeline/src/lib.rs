//! Sequential agent pipeline orchestrator.
//!
//! This crate drives an external AI coding CLI through a fixed sequence of
//! roles (coder, plan reviewer, code reviewer, PR maker), reading and writing
//! markdown artifacts and git state between stages. The architecture enforces
//! a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (roles, verdict parsing, artifact
//!   naming). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, git, process
//!   execution, prompt assembly). Isolated to enable mocking in tests.
//!
//! Orchestration modules ([`pipeline`], [`review`]) coordinate core logic
//! with I/O to implement the single `agent-pipeline` command.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod review;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
