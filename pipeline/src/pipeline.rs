//! Orchestration for a full pipeline run.
//!
//! Stages run strictly in sequence, each blocking on the external agent:
//! locate plan → coder → plan review loop → code review loop → finalize.
//! The working tree is the shared resource; serialization of stages is the
//! only discipline needed, no locking.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use tracing::{info, instrument};

use crate::core::artifacts::ReviewKind;
use crate::core::role::AgentRole;
use crate::io::config::PipelineConfig;
use crate::io::git::Git;
use crate::io::invoker::{AgentInvoker, InvokeRequest};
use crate::io::plans::locate_latest_plan;
use crate::io::prompt::{PrContext, PromptEngine, StageContext};
use crate::io::run_log::{RunRecord, run_dir, write_run_record};
use crate::review::{ReviewLoopInputs, run_review_loop};

/// Printed to stdout (and the run exits 0) when the finalize-stage snapshot
/// shows nothing to publish. This is the only condition that skips the PR.
pub const NO_CHANGES_MESSAGE: &str = "No uncommitted changes found; PR not created.";

/// Run-wide timestamp, fixed once so the run id and all code review file
/// names share a stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStamp(String);

impl RunStamp {
    pub fn now() -> Self {
        Self(Local::now().format("%Y%m%d_%H%M%S").to_string())
    }

    /// Fixed stamp for deterministic paths in tests.
    pub fn fixed(stamp: &str) -> Self {
        Self(stamp.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn run_id(&self) -> String {
        format!("run-{}", self.0)
    }
}

/// How a pipeline run ended (fatal failures are errors, not outcomes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// All stages ran; the PR maker was invoked.
    PrCreated { run_id: String },
    /// Clean tree at finalize; the PR maker was never invoked.
    NoChanges { run_id: String },
}

/// Execute one full pipeline run rooted at `root`.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_pipeline<I: AgentInvoker>(
    root: &Path,
    invoker: &I,
    cfg: &PipelineConfig,
    stamp: &RunStamp,
) -> Result<PipelineOutcome> {
    let run_id = stamp.run_id();
    let run_dir = run_dir(root, &run_id);
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("create run dir {}", run_dir.display()))?;
    ensure_pipeline_gitignore(root)?;
    let git = Git::new(root);
    let engine = PromptEngine::new();

    info!(run_id = %run_id, "locating latest plan");
    let plan = locate_latest_plan(&root.join(&cfg.plans_dir))?;
    info!(plan = %plan.path.display(), "plan selected");
    let plan_path_display = plan.path.display().to_string();
    let mut record = RunRecord::new(&run_id, stamp.as_str(), &plan.path);

    info!(stage = "coder", "starting");
    let snapshot = git.status_snapshot()?;
    let coder_prompt = engine.render_coder(&StageContext {
        plan_path: &plan_path_display,
        plan: &plan.content,
        git_status: &snapshot,
    })?;
    let coder_request = InvokeRequest::new(
        AgentRole::Coder,
        root,
        coder_prompt,
        &run_dir,
        "coder",
        cfg,
    );
    invoker.invoke(&coder_request).context("coder invocation")?;
    info!(stage = "coder", "finished");

    let mut loop_outcomes = Vec::new();
    for kind in [ReviewKind::Plan, ReviewKind::Code] {
        info!(stage = %kind, "starting");
        let outcome = run_review_loop(
            invoker,
            &git,
            cfg,
            &engine,
            &ReviewLoopInputs {
                kind,
                plan: &plan,
                stamp: stamp.as_str(),
                run_dir: &run_dir,
            },
        )?;
        info!(stage = %kind, end = ?outcome.end, iterations = outcome.iterations, "finished");
        match kind {
            ReviewKind::Plan => record.plan_review = Some(outcome.to_record()),
            ReviewKind::Code => record.code_review = Some(outcome.to_record()),
        }
        loop_outcomes.push(outcome);
    }

    info!(stage = "finalize", "starting");
    // Review reports and run logs are pipeline-owned; they never justify a PR
    // by themselves.
    let plan_review_prefix = format!("{}/", cfg.plan_review_dir);
    let code_review_prefix = format!("{}/", cfg.code_review_dir);
    let allowed = [
        plan_review_prefix.as_str(),
        code_review_prefix.as_str(),
        ".pipeline/",
    ];
    if !git.has_changes_except_prefixes(&allowed)? {
        println!("{NO_CHANGES_MESSAGE}");
        record.outcome = Some("no-changes".to_string());
        write_run_record(root, &record)?;
        return Ok(PipelineOutcome::NoChanges { run_id });
    }

    if !git.has_remote()? {
        return Err(anyhow!(
            "no 'origin' remote configured (required for PR creation)"
        ));
    }
    let branch = git.current_branch()?;
    let default_branch = git.default_branch()?;
    let final_snapshot = git.status_snapshot()?;

    let mut reports = Vec::new();
    let mut exhausted = Vec::new();
    for outcome in &loop_outcomes {
        for report in &outcome.reports {
            reports.push(report.display().to_string());
        }
        if let Some(notice) = outcome.exhausted_notice(cfg.max_iterations) {
            exhausted.push(notice);
        }
    }

    let pr_prompt = engine.render_pr_maker(&PrContext {
        plan_path: &plan_path_display,
        reports: &reports,
        exhausted: &exhausted,
        git_status: &final_snapshot,
        branch: &branch,
        default_branch: &default_branch,
    })?;
    let pr_request = InvokeRequest::new(
        AgentRole::PrMaker,
        root,
        pr_prompt,
        &run_dir,
        "pr-maker",
        cfg,
    );
    invoker.invoke(&pr_request).context("pr-maker invocation")?;
    info!(stage = "finalize", "finished");

    record.outcome = Some("pr-created".to_string());
    write_run_record(root, &record)?;
    Ok(PipelineOutcome::PrCreated { run_id })
}

/// Keep run logs and records out of git status and PR staging.
fn ensure_pipeline_gitignore(root: &Path) -> Result<()> {
    let path = root.join(".pipeline").join(".gitignore");
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&path, "*\n").with_context(|| format!("write {}", path.display()))
}
