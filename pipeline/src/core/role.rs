//! Agent roles and their capability profiles.

use serde::Serialize;

/// Role the external agent is asked to play for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentRole {
    /// Implements the plan (or applies review fixes) in the working tree.
    Coder,
    /// Reviews the working tree against the plan, writes a plan review report.
    PlanReviewer,
    /// Reviews the implementation quality, writes a code review report.
    CodeReviewer,
    /// Stages, commits, pushes, and opens (or reuses) a pull request.
    PrMaker,
}

impl AgentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Coder => "coder",
            AgentRole::PlanReviewer => "plan-reviewer",
            AgentRole::CodeReviewer => "code-reviewer",
            AgentRole::PrMaker => "pr-maker",
        }
    }

    /// Tool permissions granted to the external CLI for this role.
    ///
    /// Reviewers only need to write their report file; the coder and PR maker
    /// additionally run shell commands (build tools, git, gh).
    pub fn allowed_tools(self) -> &'static [&'static str] {
        match self {
            AgentRole::Coder => &["write", "shell"],
            AgentRole::PlanReviewer => &["write"],
            AgentRole::CodeReviewer => &["write"],
            AgentRole::PrMaker => &["write", "shell", "github"],
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_are_stable() {
        assert_eq!(AgentRole::Coder.as_str(), "coder");
        assert_eq!(AgentRole::PlanReviewer.as_str(), "plan-reviewer");
        assert_eq!(AgentRole::CodeReviewer.as_str(), "code-reviewer");
        assert_eq!(AgentRole::PrMaker.as_str(), "pr-maker");
    }

    #[test]
    fn reviewers_cannot_run_shell() {
        assert!(!AgentRole::PlanReviewer.allowed_tools().contains(&"shell"));
        assert!(!AgentRole::CodeReviewer.allowed_tools().contains(&"shell"));
        assert!(AgentRole::PrMaker.allowed_tools().contains(&"shell"));
    }
}
