//! Stable exit codes for the pipeline binary.

/// Run completed, including the graceful no-changes skip before PR creation.
pub const OK: i32 = 0;
/// Fatal precondition failure: missing plan, missing report, unparseable
/// verdict, external tool failure, or finalize-stage git failure.
pub const FATAL: i32 = 1;
