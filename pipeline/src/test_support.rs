//! Test-only helpers: a scripted agent invoker and a temp git repository.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::role::AgentRole;
use crate::io::invoker::{AgentInvoker, InvokeRequest};
use crate::io::plans::{PlanDocument, locate_latest_plan};

/// One scripted invocation: the expected role, files to drop into the
/// working tree (simulating the external tool's side effects), and the
/// output text to return.
#[derive(Debug, Clone)]
pub struct ScriptedCall {
    pub expect_role: AgentRole,
    /// Files to write relative to the request workdir.
    pub writes: Vec<(PathBuf, String)>,
    pub output: String,
}

impl ScriptedCall {
    /// An invocation with no filesystem side effects.
    pub fn plain(expect_role: AgentRole) -> Self {
        Self {
            expect_role,
            writes: Vec::new(),
            output: "ok".to_string(),
        }
    }

    /// A reviewer invocation that writes `report` to `report_rel`.
    pub fn reviewer(expect_role: AgentRole, report_rel: &str, report: &str) -> Self {
        Self {
            expect_role,
            writes: vec![(PathBuf::from(report_rel), report.to_string())],
            output: "ok".to_string(),
        }
    }

    /// Additionally write a file as a side effect (e.g. coder edits).
    pub fn with_write(mut self, rel: &str, contents: &str) -> Self {
        self.writes.push((PathBuf::from(rel), contents.to_string()));
        self
    }
}

/// Invoker that replays a fixed script instead of spawning processes.
///
/// Panics (fails the test) when invoked past the end of the script or with
/// an unexpected role.
pub struct ScriptedInvoker {
    script: Mutex<Vec<ScriptedCall>>,
    next: Mutex<usize>,
    invoked_roles: Mutex<Vec<AgentRole>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInvoker {
    pub fn new(script: Vec<ScriptedCall>) -> Self {
        Self {
            script: Mutex::new(script),
            next: Mutex::new(0),
            invoked_roles: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Roles invoked so far, in order.
    pub fn roles(&self) -> Vec<AgentRole> {
        self.invoked_roles.lock().expect("lock").clone()
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock").clone()
    }
}

impl AgentInvoker for ScriptedInvoker {
    fn invoke(&self, request: &InvokeRequest) -> Result<String> {
        let index = {
            let mut next = self.next.lock().expect("lock");
            let index = *next;
            *next += 1;
            index
        };
        let call = {
            let script = self.script.lock().expect("lock");
            script
                .get(index)
                .cloned()
                .ok_or_else(|| anyhow!("unscripted invocation #{index} ({})", request.role))?
        };
        if call.expect_role != request.role {
            return Err(anyhow!(
                "invocation #{index}: expected role {}, got {}",
                call.expect_role,
                request.role
            ));
        }
        self.invoked_roles
            .lock()
            .expect("lock")
            .push(request.role);
        self.prompts
            .lock()
            .expect("lock")
            .push(request.prompt.clone());

        for (rel, contents) in &call.writes {
            let path = request.workdir.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        }
        Ok(call.output)
    }
}

/// Temp git repository with an initial commit and a local `origin` remote,
/// so finalize-stage branch discovery works without a network.
pub struct TestRepo {
    /// Keeps the backing tempdir alive for the repo's lifetime.
    _dir: TempDir,
    root: PathBuf,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("tempdir")?;
        let root = dir.path().join("work");
        let remote = dir.path().join("remote.git");
        fs::create_dir_all(&root)?;

        git(&root, &["init", "-b", "main"])?;
        git(&root, &["config", "user.email", "pipeline@test"])?;
        git(&root, &["config", "user.name", "pipeline"])?;
        fs::write(root.join("README.md"), "# test repo\n")?;
        git(&root, &["add", "-A"])?;
        git(&root, &["commit", "-m", "initial commit"])?;

        git(dir.path(), &["init", "--bare", "-b", "main", "remote.git"])?;
        let remote_str = remote.to_string_lossy().into_owned();
        git(&root, &["remote", "add", "origin", &remote_str])?;
        git(&root, &["push", "-q", "origin", "main"])?;

        Ok(Self { _dir: dir, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a repo without any `origin` remote.
    pub fn without_remote() -> Result<Self> {
        let repo = Self::new()?;
        git(&repo.root, &["remote", "remove", "origin"])?;
        Ok(repo)
    }

    /// Write a plan into the default plans directory and return it as the
    /// locator would.
    pub fn write_plan(&self, stem: &str, content: &str) -> Result<PlanDocument> {
        let dir = self
            .root
            .join("stories and plans")
            .join("implementation plans");
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        fs::write(dir.join(format!("{stem}.md")), content)?;
        // Keep the worktree clean so only agent writes show up as changes.
        git(&self.root, &["add", "-A"])?;
        git(&self.root, &["commit", "-q", "-m", "add plan"])?;
        locate_latest_plan(&dir)
    }
}

fn git(dir: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}
