//! Deterministic artifact names for review reports.
//!
//! Each review loop iteration writes a distinct report file rather than
//! overwriting: iteration 1 uses the bare name, later iterations append an
//! `_iter<N>` suffix. Downstream tooling (and humans) rely on these names,
//! so they are derived here and nowhere else.

use serde::Serialize;

/// Which review loop an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewKind {
    Plan,
    Code,
}

impl ReviewKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewKind::Plan => "plan-review",
            ReviewKind::Code => "code-review",
        }
    }
}

impl std::fmt::Display for ReviewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File name for a plan review report. `plan_stem` is the plan file name
/// without its `.md` extension.
pub fn plan_review_filename(plan_stem: &str, iter: u32) -> String {
    format!("plan_review_{plan_stem}{}.md", iter_suffix(iter))
}

/// File name for a code review report. `stamp` is fixed once per run so all
/// iterations share a stem.
pub fn code_review_filename(stamp: &str, iter: u32) -> String {
    format!("code_review_{stamp}{}.md", iter_suffix(iter))
}

fn iter_suffix(iter: u32) -> String {
    if iter <= 1 {
        String::new()
    } else {
        format!("_iter{iter}")
    }
}
