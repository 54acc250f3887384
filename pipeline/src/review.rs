//! Bounded review loop alternating a reviewer and a corrective coder.
//!
//! One loop implementation serves both review kinds. Each iteration invokes
//! the reviewer, which writes a distinctly-named report file, then parses the
//! verdict marker. Pass ends the loop; Fail feeds the report back to the
//! coder as fix-only instructions, up to the iteration cap. Exhausting the
//! cap while still failing is logged and surfaced to the PR stage, but never
//! aborts the run: the escalation path is human PR review.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::core::artifacts::{ReviewKind, code_review_filename, plan_review_filename};
use crate::core::role::AgentRole;
use crate::core::verdict::{UnparseableVerdictError, Verdict, parse_verdict};
use crate::io::config::PipelineConfig;
use crate::io::git::Git;
use crate::io::invoker::{AgentInvoker, InvokeRequest, invoke_expecting_artifact};
use crate::io::plans::PlanDocument;
use crate::io::prompt::{PromptEngine, StageContext};
use crate::io::run_log::LoopRecord;

/// Terminal state of a review loop. Both allow the pipeline to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    /// A Pass verdict was observed.
    Done,
    /// The iteration cap was reached with the last verdict still Fail.
    Exhausted,
}

/// Summary of one review loop.
#[derive(Debug, Clone)]
pub struct ReviewLoopOutcome {
    pub kind: ReviewKind,
    pub end: LoopEnd,
    /// Reviewer invocations performed.
    pub iterations: u32,
    /// Corrective coder invocations performed.
    pub fix_invocations: u32,
    /// Verdict per iteration, in order.
    pub verdicts: Vec<Verdict>,
    /// Report file per iteration, relative to the repository root.
    pub reports: Vec<PathBuf>,
}

impl ReviewLoopOutcome {
    /// Notice for the PR body when the loop ended exhausted.
    pub fn exhausted_notice(&self, cap: u32) -> Option<String> {
        match self.end {
            LoopEnd::Done => None,
            LoopEnd::Exhausted => Some(format!(
                "{} still failing after {cap} iterations",
                self.kind
            )),
        }
    }

    pub fn to_record(&self) -> LoopRecord {
        LoopRecord {
            kind: self.kind,
            iterations: self.iterations,
            fix_invocations: self.fix_invocations,
            verdicts: self.verdicts.clone(),
            end: match self.end {
                LoopEnd::Done => "done".to_string(),
                LoopEnd::Exhausted => "exhausted".to_string(),
            },
            reports: self.reports.clone(),
        }
    }
}

/// Inputs for one review loop.
#[derive(Debug, Clone)]
pub struct ReviewLoopInputs<'a> {
    pub kind: ReviewKind,
    pub plan: &'a PlanDocument,
    /// Run-wide timestamp used in code review file names.
    pub stamp: &'a str,
    /// Directory for this run's invocation logs.
    pub run_dir: &'a Path,
}

/// Run one bounded review loop to a terminal state.
pub fn run_review_loop<I: AgentInvoker>(
    invoker: &I,
    git: &Git,
    cfg: &PipelineConfig,
    engine: &PromptEngine,
    inputs: &ReviewLoopInputs<'_>,
) -> Result<ReviewLoopOutcome> {
    let root = git.workdir();
    let kind = inputs.kind;
    let (reviewer_role, results_dir_name) = match kind {
        ReviewKind::Plan => (AgentRole::PlanReviewer, cfg.plan_review_dir.as_str()),
        ReviewKind::Code => (AgentRole::CodeReviewer, cfg.code_review_dir.as_str()),
    };
    let results_dir = root.join(results_dir_name);
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("create results dir {}", results_dir.display()))?;

    let plan_path_display = inputs.plan.path.display().to_string();
    let mut verdicts = Vec::new();
    let mut reports = Vec::new();
    let mut fix_invocations = 0u32;
    let mut prior_report: Option<String> = None;

    for iteration in 1..=cfg.max_iterations {
        let filename = match kind {
            ReviewKind::Plan => plan_review_filename(&inputs.plan.stem, iteration),
            ReviewKind::Code => code_review_filename(inputs.stamp, iteration),
        };
        let report_rel = Path::new(results_dir_name).join(&filename);
        let report_path = root.join(&report_rel);

        info!(kind = %kind, iteration, report = %report_rel.display(), "invoking reviewer");
        let snapshot = git.status_snapshot()?;
        let ctx = StageContext {
            plan_path: &plan_path_display,
            plan: &inputs.plan.content,
            git_status: &snapshot,
        };
        let prompt = engine.render_reviewer(
            kind,
            &ctx,
            &report_rel.display().to_string(),
            iteration,
            prior_report.as_deref(),
        )?;
        let request = InvokeRequest::new(
            reviewer_role,
            root,
            prompt,
            inputs.run_dir,
            &format!("{kind}-{iteration}"),
            cfg,
        );
        invoke_expecting_artifact(invoker, &request, &report_path)?;

        let report_text = fs::read_to_string(&report_path)
            .with_context(|| format!("read report {}", report_path.display()))?;
        let verdict = parse_verdict(&report_text).ok_or_else(|| UnparseableVerdictError {
            report_path: report_path.clone(),
        })?;
        info!(kind = %kind, iteration, verdict = %verdict, "reviewer verdict");
        verdicts.push(verdict);
        reports.push(report_rel.clone());

        if verdict.is_pass() {
            return Ok(ReviewLoopOutcome {
                kind,
                end: LoopEnd::Done,
                iterations: iteration,
                fix_invocations,
                verdicts,
                reports,
            });
        }

        if iteration == cfg.max_iterations {
            warn!(kind = %kind, cap = cfg.max_iterations, "review loop exhausted, proceeding");
            return Ok(ReviewLoopOutcome {
                kind,
                end: LoopEnd::Exhausted,
                iterations: iteration,
                fix_invocations,
                verdicts,
                reports,
            });
        }

        info!(kind = %kind, iteration, "invoking coder with fix instructions");
        let fix_prompt = engine.render_fixer(
            kind,
            &ctx,
            &report_rel.display().to_string(),
            &report_text,
        )?;
        let fix_request = InvokeRequest::new(
            AgentRole::Coder,
            root,
            fix_prompt,
            inputs.run_dir,
            &format!("{kind}-fix-{iteration}"),
            cfg,
        );
        invoker
            .invoke(&fix_request)
            .with_context(|| format!("{kind} fix invocation {iteration}"))?;
        fix_invocations += 1;
        prior_report = Some(report_text);
    }

    unreachable!("loop returns from its final iteration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedCall, ScriptedInvoker, TestRepo};

    fn inputs<'a>(plan: &'a PlanDocument, run_dir: &'a Path) -> ReviewLoopInputs<'a> {
        ReviewLoopInputs {
            kind: ReviewKind::Plan,
            plan,
            stamp: "20260829_141500",
            run_dir,
        }
    }

    #[test]
    fn pass_on_first_iteration_makes_no_fix_calls() {
        let repo = TestRepo::new().expect("repo");
        let plan = repo.write_plan("implementation_plan_auth", "# Plan").expect("plan");
        let run_dir = repo.root().join(".pipeline/runs/run-test");

        let invoker = ScriptedInvoker::new(vec![ScriptedCall::reviewer(
            AgentRole::PlanReviewer,
            "Plan Reviewer Results/plan_review_implementation_plan_auth.md",
            "Overall Match: Yes\n",
        )]);
        let git = Git::new(repo.root());
        let outcome = run_review_loop(
            &invoker,
            &git,
            &PipelineConfig::default(),
            &PromptEngine::new(),
            &inputs(&plan, &run_dir),
        )
        .expect("loop");

        assert_eq!(outcome.end, LoopEnd::Done);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.fix_invocations, 0);
        assert_eq!(outcome.verdicts, vec![Verdict::Pass]);
        assert_eq!(invoker.roles(), vec![AgentRole::PlanReviewer]);
    }

    #[test]
    fn fail_fail_pass_makes_two_fix_calls() {
        let repo = TestRepo::new().expect("repo");
        let plan = repo.write_plan("implementation_plan_auth", "# Plan").expect("plan");
        let run_dir = repo.root().join(".pipeline/runs/run-test");

        let invoker = ScriptedInvoker::new(vec![
            ScriptedCall::reviewer(
                AgentRole::PlanReviewer,
                "Plan Reviewer Results/plan_review_implementation_plan_auth.md",
                "Overall Match: No\n",
            ),
            ScriptedCall::plain(AgentRole::Coder),
            ScriptedCall::reviewer(
                AgentRole::PlanReviewer,
                "Plan Reviewer Results/plan_review_implementation_plan_auth_iter2.md",
                "Overall Match: No\n",
            ),
            ScriptedCall::plain(AgentRole::Coder),
            ScriptedCall::reviewer(
                AgentRole::PlanReviewer,
                "Plan Reviewer Results/plan_review_implementation_plan_auth_iter3.md",
                "Overall Match: Yes\n",
            ),
        ]);
        let git = Git::new(repo.root());
        let outcome = run_review_loop(
            &invoker,
            &git,
            &PipelineConfig::default(),
            &PromptEngine::new(),
            &inputs(&plan, &run_dir),
        )
        .expect("loop");

        assert_eq!(outcome.end, LoopEnd::Done);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.fix_invocations, 2);
        assert_eq!(
            outcome.verdicts,
            vec![Verdict::Fail, Verdict::Fail, Verdict::Pass]
        );
        // Each iteration produced a distinct report file.
        assert_eq!(outcome.reports.len(), 3);
        assert!(outcome.reports[1].to_string_lossy().contains("_iter2"));
    }

    #[test]
    fn exhausted_loop_is_not_an_error() {
        let repo = TestRepo::new().expect("repo");
        let plan = repo.write_plan("implementation_plan_auth", "# Plan").expect("plan");
        let run_dir = repo.root().join(".pipeline/runs/run-test");

        let invoker = ScriptedInvoker::new(vec![
            ScriptedCall::reviewer(
                AgentRole::PlanReviewer,
                "Plan Reviewer Results/plan_review_implementation_plan_auth.md",
                "Overall Match: No\n",
            ),
            ScriptedCall::plain(AgentRole::Coder),
            ScriptedCall::reviewer(
                AgentRole::PlanReviewer,
                "Plan Reviewer Results/plan_review_implementation_plan_auth_iter2.md",
                "Overall Match: No\n",
            ),
            ScriptedCall::plain(AgentRole::Coder),
            ScriptedCall::reviewer(
                AgentRole::PlanReviewer,
                "Plan Reviewer Results/plan_review_implementation_plan_auth_iter3.md",
                "Overall Match: No\n",
            ),
        ]);
        let git = Git::new(repo.root());
        let outcome = run_review_loop(
            &invoker,
            &git,
            &PipelineConfig::default(),
            &PromptEngine::new(),
            &inputs(&plan, &run_dir),
        )
        .expect("loop");

        assert_eq!(outcome.end, LoopEnd::Exhausted);
        assert_eq!(outcome.fix_invocations, 2);
        assert!(
            outcome
                .exhausted_notice(3)
                .expect("notice")
                .contains("after 3 iterations")
        );
    }

    #[test]
    fn report_without_marker_is_fatal() {
        let repo = TestRepo::new().expect("repo");
        let plan = repo.write_plan("implementation_plan_auth", "# Plan").expect("plan");
        let run_dir = repo.root().join(".pipeline/runs/run-test");

        let invoker = ScriptedInvoker::new(vec![ScriptedCall::reviewer(
            AgentRole::PlanReviewer,
            "Plan Reviewer Results/plan_review_implementation_plan_auth.md",
            "# Review without any verdict line\n",
        )]);
        let git = Git::new(repo.root());
        let err = run_review_loop(
            &invoker,
            &git,
            &PipelineConfig::default(),
            &PromptEngine::new(),
            &inputs(&plan, &run_dir),
        )
        .unwrap_err();

        assert!(err.downcast_ref::<UnparseableVerdictError>().is_some());
    }

    #[test]
    fn missing_report_file_is_fatal() {
        let repo = TestRepo::new().expect("repo");
        let plan = repo.write_plan("implementation_plan_auth", "# Plan").expect("plan");
        let run_dir = repo.root().join(".pipeline/runs/run-test");

        // Reviewer "runs" but never writes its report.
        let invoker = ScriptedInvoker::new(vec![ScriptedCall::plain(AgentRole::PlanReviewer)]);
        let git = Git::new(repo.root());
        let err = run_review_loop(
            &invoker,
            &git,
            &PipelineConfig::default(),
            &PromptEngine::new(),
            &inputs(&plan, &run_dir),
        )
        .unwrap_err();

        assert!(
            err.downcast_ref::<crate::io::invoker::MissingArtifactError>()
                .is_some()
        );
    }
}
