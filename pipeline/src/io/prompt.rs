//! Prompt assembly for agent invocations.
//!
//! Each role has a markdown template embedded at compile time; context
//! (plan text, prior review text, git snapshot) is interpolated with
//! minijinja. Templates live under `src/io/prompts/`.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::artifacts::ReviewKind;

const CODER_TEMPLATE: &str = include_str!("prompts/coder.md");
const PLAN_REVIEWER_TEMPLATE: &str = include_str!("prompts/plan_reviewer.md");
const CODE_REVIEWER_TEMPLATE: &str = include_str!("prompts/code_reviewer.md");
const FIXER_TEMPLATE: &str = include_str!("prompts/fixer.md");
const PR_MAKER_TEMPLATE: &str = include_str!("prompts/pr_maker.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

/// Inputs shared by the coder and reviewer prompts.
#[derive(Debug, Clone)]
pub struct StageContext<'a> {
    /// Display path of the selected plan.
    pub plan_path: &'a str,
    /// Plan text, verbatim.
    pub plan: &'a str,
    /// Raw `git status --porcelain` snapshot.
    pub git_status: &'a str,
}

/// Inputs for the finalize (PR maker) prompt.
#[derive(Debug, Clone)]
pub struct PrContext<'a> {
    pub plan_path: &'a str,
    /// Display paths of every review report produced this run.
    pub reports: &'a [String],
    /// Human-readable notices for review loops that exhausted retries.
    pub exhausted: &'a [String],
    pub git_status: &'a str,
    pub branch: &'a str,
    pub default_branch: &'a str,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("coder", CODER_TEMPLATE)
            .expect("coder template should be valid");
        env.add_template("plan_reviewer", PLAN_REVIEWER_TEMPLATE)
            .expect("plan reviewer template should be valid");
        env.add_template("code_reviewer", CODE_REVIEWER_TEMPLATE)
            .expect("code reviewer template should be valid");
        env.add_template("fixer", FIXER_TEMPLATE)
            .expect("fixer template should be valid");
        env.add_template("pr_maker", PR_MAKER_TEMPLATE)
            .expect("pr maker template should be valid");
        Self { env }
    }

    /// Initial coder prompt: implement the whole plan.
    pub fn render_coder(&self, ctx: &StageContext<'_>) -> Result<String> {
        let template = self.env.get_template("coder")?;
        let rendered = template.render(context! {
            plan_path => ctx.plan_path,
            plan => ctx.plan.trim(),
            git_status => ctx.git_status.trim_end(),
        })?;
        Ok(rendered)
    }

    /// Reviewer prompt for either review kind.
    ///
    /// `prior_report` carries the previous iteration's review text so the
    /// reviewer can verify its issues were addressed.
    pub fn render_reviewer(
        &self,
        kind: ReviewKind,
        ctx: &StageContext<'_>,
        report_path: &str,
        iteration: u32,
        prior_report: Option<&str>,
    ) -> Result<String> {
        let name = match kind {
            ReviewKind::Plan => "plan_reviewer",
            ReviewKind::Code => "code_reviewer",
        };
        let template = self.env.get_template(name)?;
        let rendered = template.render(context! {
            plan_path => ctx.plan_path,
            plan => ctx.plan.trim(),
            git_status => ctx.git_status.trim_end(),
            report_path => report_path,
            iteration => iteration,
            prior_report => prior_report.map(str::trim).filter(|s| !s.is_empty()),
        })?;
        Ok(rendered)
    }

    /// Fix-only coder prompt scoped to the latest failed review.
    pub fn render_fixer(
        &self,
        kind: ReviewKind,
        ctx: &StageContext<'_>,
        report_path: &str,
        report: &str,
    ) -> Result<String> {
        let template = self.env.get_template("fixer")?;
        let rendered = template.render(context! {
            review_label => kind.as_str(),
            report_path => report_path,
            report => report.trim(),
            plan_path => ctx.plan_path,
            plan => ctx.plan.trim(),
        })?;
        Ok(rendered)
    }

    /// Finalize prompt: commit, push, open (or reuse) the pull request.
    pub fn render_pr_maker(&self, ctx: &PrContext<'_>) -> Result<String> {
        let template = self.env.get_template("pr_maker")?;
        let rendered = template.render(context! {
            plan_path => ctx.plan_path,
            reports => ctx.reports,
            exhausted => (!ctx.exhausted.is_empty()).then_some(ctx.exhausted),
            git_status => ctx.git_status.trim_end(),
            branch => ctx.branch,
            default_branch => ctx.default_branch,
        })?;
        Ok(rendered)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> StageContext<'static> {
        StageContext {
            plan_path: "plans/implementation_plan_auth.md",
            plan: "# Plan\n\nAdd auth.",
            git_status: " M src/views.py\n",
        }
    }

    #[test]
    fn coder_prompt_includes_plan_and_snapshot() {
        let prompt = PromptEngine::new().render_coder(&stage()).expect("render");
        assert!(prompt.contains("Add auth."));
        assert!(prompt.contains("plans/implementation_plan_auth.md"));
        assert!(prompt.contains(" M src/views.py"));
        assert!(prompt.contains("Do not commit"));
    }

    #[test]
    fn reviewer_prompt_states_marker_contract_and_report_path() {
        let prompt = PromptEngine::new()
            .render_reviewer(ReviewKind::Plan, &stage(), "Plan Reviewer Results/r.md", 1, None)
            .expect("render");
        assert!(prompt.contains("Overall Match: Yes"));
        assert!(prompt.contains("Plan Reviewer Results/r.md"));
        assert!(!prompt.contains("Previous review"));
    }

    #[test]
    fn reviewer_prompt_threads_prior_report_on_retry() {
        let prompt = PromptEngine::new()
            .render_reviewer(
                ReviewKind::Code,
                &stage(),
                "Code Reviewer Results/r_iter2.md",
                2,
                Some("Overall Match: No\n\nMissing error handling."),
            )
            .expect("render");
        assert!(prompt.contains("Previous review"));
        assert!(prompt.contains("Missing error handling."));
        assert!(prompt.contains("iteration 2"));
    }

    #[test]
    fn fixer_prompt_is_scoped_to_the_review() {
        let prompt = PromptEngine::new()
            .render_fixer(
                ReviewKind::Plan,
                &stage(),
                "Plan Reviewer Results/r.md",
                "Overall Match: No\n\nStep 3 not implemented.",
            )
            .expect("render");
        assert!(prompt.contains("ONLY the issues raised"));
        assert!(prompt.contains("Step 3 not implemented."));
        assert!(prompt.contains("failed plan-review"));
    }

    #[test]
    fn pr_prompt_lists_reports_and_exhaustion_notices() {
        let reports = vec![
            "Plan Reviewer Results/r.md".to_string(),
            "Code Reviewer Results/c.md".to_string(),
        ];
        let exhausted = vec!["code-review still failing after 3 iterations".to_string()];
        let prompt = PromptEngine::new()
            .render_pr_maker(&PrContext {
                plan_path: "plans/implementation_plan_auth.md",
                reports: &reports,
                exhausted: &exhausted,
                git_status: " M src/views.py\n",
                branch: "feature/auth",
                default_branch: "main",
            })
            .expect("render");
        assert!(prompt.contains("Plan Reviewer Results/r.md"));
        assert!(prompt.contains("still failing after 3 iterations"));
        assert!(prompt.contains("`feature/auth`"));
        assert!(prompt.contains("`main`"));
    }

    #[test]
    fn pr_prompt_omits_exhaustion_block_when_clean() {
        let reports = vec!["Plan Reviewer Results/r.md".to_string()];
        let prompt = PromptEngine::new()
            .render_pr_maker(&PrContext {
                plan_path: "p.md",
                reports: &reports,
                exhausted: &[],
                git_status: "",
                branch: "b",
                default_branch: "main",
            })
            .expect("render");
        assert!(!prompt.contains("exhausted"));
    }
}
