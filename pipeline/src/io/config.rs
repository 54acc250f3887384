//! Pipeline configuration stored in `pipeline.toml` at the repository root.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Pipeline configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values; a missing file is
/// equivalent to an empty one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Iteration cap per review loop (reviewer calls per loop).
    pub max_iterations: u32,

    /// Command to launch the external agent CLI (e.g. `["copilot"]`).
    pub agent_command: Vec<String>,

    /// Wall-clock budget per agent invocation in seconds.
    pub invoke_timeout_secs: u64,

    /// Truncate captured agent stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Directory containing `implementation_plan_*.md` files.
    pub plans_dir: String,

    /// Directory where the plan reviewer writes its reports.
    pub plan_review_dir: String,

    /// Directory where the code reviewer writes its reports.
    pub code_review_dir: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            agent_command: vec!["copilot".to_string()],
            invoke_timeout_secs: 30 * 60,
            output_limit_bytes: 200_000,
            plans_dir: "stories and plans/implementation plans".to_string(),
            plan_review_dir: "Plan Reviewer Results".to_string(),
            code_review_dir: "Code Reviewer Results".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.agent_command.is_empty() || self.agent_command[0].trim().is_empty() {
            return Err(anyhow!("agent_command must be a non-empty array"));
        }
        if self.invoke_timeout_secs == 0 {
            return Err(anyhow!("invoke_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        for (field, value) in [
            ("plans_dir", &self.plans_dir),
            ("plan_review_dir", &self.plan_review_dir),
            ("code_review_dir", &self.code_review_dir),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{field} must not be empty"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PipelineConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("pipeline.toml");
        fs::write(&path, "max_iterations = 5\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_iterations, 5);
        assert_eq!(cfg.agent_command, vec!["copilot".to_string()]);
    }

    #[test]
    fn zero_iteration_cap_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("pipeline.toml");
        fs::write(&path, "max_iterations = 0\n").expect("write");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn empty_agent_command_is_rejected() {
        let cfg = PipelineConfig {
            agent_command: Vec::new(),
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
