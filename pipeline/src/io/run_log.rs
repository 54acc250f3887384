//! Per-run record under `.pipeline/runs/`.
//!
//! The markdown artifacts on disk remain the source of truth consumed across
//! process boundaries; the run record is observability only. Invocation logs
//! for the run live in `.pipeline/runs/<run-id>/`, the record itself at
//! `.pipeline/runs/<run-id>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::artifacts::ReviewKind;
use crate::core::verdict::Verdict;

/// Directory holding invocation logs for one run.
pub fn run_dir(root: &Path, run_id: &str) -> PathBuf {
    root.join(".pipeline").join("runs").join(run_id)
}

/// Path of the JSON run record.
pub fn record_path(root: &Path, run_id: &str) -> PathBuf {
    root.join(".pipeline")
        .join("runs")
        .join(format!("{run_id}.json"))
}

/// Outcome of one bounded review loop, as recorded.
#[derive(Debug, Clone, Serialize)]
pub struct LoopRecord {
    pub kind: ReviewKind,
    /// Reviewer invocations performed (1..=cap).
    pub iterations: u32,
    /// Corrective coder invocations performed (iterations - 1 at most).
    pub fix_invocations: u32,
    /// Verdict per iteration, in order.
    pub verdicts: Vec<Verdict>,
    /// `done` or `exhausted`.
    pub end: String,
    /// Report file per iteration, in order.
    pub reports: Vec<PathBuf>,
}

/// Full record of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: String,
    pub plan_path: PathBuf,
    pub plan_review: Option<LoopRecord>,
    pub code_review: Option<LoopRecord>,
    /// `pr-created`, `no-changes`, or absent if the run aborted early.
    pub outcome: Option<String>,
}

impl RunRecord {
    pub fn new(run_id: &str, started_at: &str, plan_path: &Path) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at: started_at.to_string(),
            plan_path: plan_path.to_path_buf(),
            plan_review: None,
            code_review: None,
            outcome: None,
        }
    }
}

/// Atomically write the run record (temp file + rename).
pub fn write_run_record(root: &Path, record: &RunRecord) -> Result<PathBuf> {
    let path = record_path(root, &record.run_id);
    let parent = path
        .parent()
        .with_context(|| format!("record path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut buf = serde_json::to_string_pretty(record).context("serialize run record")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp record {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &path)
        .with_context(|| format!("replace record {}", path.display()))?;
    Ok(path)
}
