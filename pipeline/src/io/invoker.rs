//! Invoker abstraction for agent invocation.
//!
//! The [`AgentInvoker`] trait decouples pipeline orchestration from the
//! actual agent backend (the external `copilot` CLI). Tests use scripted
//! invokers that return predetermined outputs without spawning processes.
//!
//! The external tool may create or modify arbitrary files in the working
//! tree; the orchestrator only verifies afterward that the artifact it
//! expects actually exists.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::role::AgentRole;
use crate::io::config::PipelineConfig;
use crate::io::process::{CommandOutput, run_command_with_timeout};

/// Parameters for one agent invocation.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Role the agent plays for this invocation.
    pub role: AgentRole,
    /// Working directory for the agent process.
    pub workdir: PathBuf,
    /// Fully assembled prompt text, fed on stdin.
    pub prompt: String,
    /// Path to write the combined stdout/stderr log.
    pub log_path: PathBuf,
    /// Maximum time to wait for the agent to complete.
    pub timeout: Duration,
    /// Truncate captured output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl InvokeRequest {
    /// Build a request from config, filling in the per-run log location.
    pub fn new(
        role: AgentRole,
        workdir: &Path,
        prompt: String,
        run_dir: &Path,
        stage: &str,
        cfg: &PipelineConfig,
    ) -> Self {
        Self {
            role,
            workdir: workdir.to_path_buf(),
            prompt,
            log_path: run_dir.join(format!("{stage}.log")),
            timeout: Duration::from_secs(cfg.invoke_timeout_secs),
            output_limit_bytes: cfg.output_limit_bytes,
        }
    }
}

/// An invocation that was supposed to produce a report file did not. Fatal.
#[derive(Debug, Clone)]
pub struct MissingArtifactError {
    pub role: AgentRole,
    pub expected: PathBuf,
}

impl fmt::Display for MissingArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} did not produce expected artifact {}",
            self.role,
            self.expected.display()
        )
    }
}

impl std::error::Error for MissingArtifactError {}

/// Abstraction over agent execution backends.
pub trait AgentInvoker {
    /// Run the agent, blocking until completion. Returns combined output.
    fn invoke(&self, request: &InvokeRequest) -> Result<String>;
}

/// Invoker that spawns the external agent CLI as a subprocess.
pub struct CopilotInvoker {
    command: Vec<String>,
}

impl CopilotInvoker {
    pub fn new(cfg: &PipelineConfig) -> Self {
        Self {
            command: cfg.agent_command.clone(),
        }
    }
}

impl AgentInvoker for CopilotInvoker {
    #[instrument(skip_all, fields(role = %request.role, timeout_secs = request.timeout.as_secs()))]
    fn invoke(&self, request: &InvokeRequest) -> Result<String> {
        info!(workdir = %request.workdir.display(), "starting agent invocation");

        let program = self
            .command
            .first()
            .ok_or_else(|| anyhow!("agent_command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..]);
        cmd.arg("--add-dir").arg(&request.workdir);
        for tool in request.role.allowed_tools() {
            cmd.arg("--allow-tool").arg(tool);
        }
        // Prompt goes over stdin to avoid argv length limits on large plans.
        cmd.arg("--prompt").arg("-").current_dir(&request.workdir);

        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .with_context(|| format!("run {} agent", request.role))?;

        write_invocation_log(&request.log_path, &output, request.output_limit_bytes)?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "agent timed out");
            return Err(anyhow!(
                "{} agent timed out after {:?}",
                request.role,
                request.timeout
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "agent failed");
            return Err(anyhow!(
                "{} agent failed with status {:?}",
                request.role,
                output.status.code()
            ));
        }

        debug!("agent invocation completed");
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(combined)
    }
}

/// Invoke the agent, then require that the expected report file exists.
#[instrument(skip_all, fields(role = %request.role, expected = %expected.display()))]
pub fn invoke_expecting_artifact<I: AgentInvoker>(
    invoker: &I,
    request: &InvokeRequest,
    expected: &Path,
) -> Result<String> {
    let output = invoker.invoke(request)?;
    if !expected.exists() {
        return Err(MissingArtifactError {
            role: request.role,
            expected: expected.to_path_buf(),
        }
        .into());
    }
    debug!("expected artifact present");
    Ok(output)
}

fn write_invocation_log(path: &Path, output: &CommandOutput, output_limit: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create invocation log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stdout));
    buf.push_str(&output.stdout_truncated_notice("agent"));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stderr));
    buf.push_str(&output.stderr_truncated_notice("agent"));
    if output.timed_out {
        buf.push_str("\n[agent timed out]\n");
    }

    if buf.len() > output_limit {
        let truncated = format!(
            "{}\n[truncated {} bytes]\n",
            &buf[..output_limit],
            buf.len() - output_limit
        );
        fs::write(path, truncated)
            .with_context(|| format!("write invocation log {}", path.display()))?;
        return Ok(());
    }

    fs::write(path, buf).with_context(|| format!("write invocation log {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeInvoker {
        write_expected: bool,
        expected: PathBuf,
    }

    impl AgentInvoker for FakeInvoker {
        fn invoke(&self, _request: &InvokeRequest) -> Result<String> {
            if self.write_expected {
                fs::write(&self.expected, "Overall Match: Yes\n")?;
            }
            Ok("ok".to_string())
        }
    }

    fn request(temp: &Path) -> InvokeRequest {
        InvokeRequest {
            role: AgentRole::PlanReviewer,
            workdir: temp.to_path_buf(),
            prompt: "prompt".to_string(),
            log_path: temp.join("stage.log"),
            timeout: Duration::from_secs(1),
            output_limit_bytes: 1000,
        }
    }

    #[test]
    fn passes_through_when_artifact_exists() {
        let temp = tempfile::tempdir().expect("tempdir");
        let expected = temp.path().join("report.md");
        let fake = FakeInvoker {
            write_expected: true,
            expected: expected.clone(),
        };

        let output =
            invoke_expecting_artifact(&fake, &request(temp.path()), &expected).expect("invoke");
        assert_eq!(output, "ok");
    }

    #[test]
    fn errors_when_artifact_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let expected = temp.path().join("report.md");
        let fake = FakeInvoker {
            write_expected: false,
            expected: expected.clone(),
        };

        let err = invoke_expecting_artifact(&fake, &request(temp.path()), &expected).unwrap_err();
        let missing = err
            .downcast_ref::<MissingArtifactError>()
            .expect("typed error");
        assert_eq!(missing.expected, expected);
    }
}
