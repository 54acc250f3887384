//! Plan discovery under the plans directory.
//!
//! Plans are markdown files named `implementation_plan_*.md`, produced
//! upstream of this pipeline. The "latest" plan is the one with the newest
//! modification time; it is immutable once selected for a run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, instrument};

static PLAN_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^implementation_plan_.+\.md$").expect("plan name regex should be valid")
});

/// Plans directory is absent or holds no matching plan file. Fatal.
#[derive(Debug, Clone)]
pub struct PlanNotFoundError {
    pub dir: PathBuf,
}

impl fmt::Display for PlanNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no implementation plan (implementation_plan_*.md) found in {}",
            self.dir.display()
        )
    }
}

impl std::error::Error for PlanNotFoundError {}

/// A plan selected for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDocument {
    pub path: PathBuf,
    /// File name without the `.md` extension, used to derive review names.
    pub stem: String,
    /// Plan text, passed verbatim to downstream prompts.
    pub content: String,
}

/// Locate the most recently modified plan in `dir` and read its content.
///
/// Equal modification times are broken by the lexically greatest file name so
/// the choice stays deterministic.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn locate_latest_plan(dir: &Path) -> Result<PlanDocument> {
    let mut latest: Option<(SystemTime, String, PathBuf)> = None;

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PlanNotFoundError {
                dir: dir.to_path_buf(),
            }
            .into());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("read plans dir {}", dir.display()));
        }
    };
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !PLAN_NAME_RE.is_match(&name) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .with_context(|| format!("stat {}", entry.path().display()))?;
        let candidate = (modified, name, entry.path());
        let newer = match &latest {
            None => true,
            Some((best_time, best_name, _)) => {
                candidate.0 > *best_time || (candidate.0 == *best_time && candidate.1 > *best_name)
            }
        };
        if newer {
            latest = Some(candidate);
        }
    }

    let (_, name, path) = latest.ok_or_else(|| PlanNotFoundError {
        dir: dir.to_path_buf(),
    })?;
    let stem = name
        .strip_suffix(".md")
        .unwrap_or(name.as_str())
        .to_string();
    let content =
        fs::read_to_string(&path).with_context(|| format!("read plan {}", path.display()))?;
    debug!(plan = %path.display(), "selected latest plan");
    Ok(PlanDocument {
        path,
        stem,
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn write_plan(dir: &Path, name: &str, mtime_offset_secs: u64) {
        let path = dir.join(name);
        fs::write(&path, format!("# {name}\n")).expect("write plan");
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + mtime_offset_secs);
        let file = File::options().write(true).open(&path).expect("open");
        file.set_modified(mtime).expect("set mtime");
    }

    #[test]
    fn missing_directory_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = locate_latest_plan(&temp.path().join("absent")).unwrap_err();
        assert!(err.downcast_ref::<PlanNotFoundError>().is_some());
    }

    #[test]
    fn non_directory_plans_path_is_not_reported_as_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plans");
        fs::write(&path, "a file, not a directory").expect("write");

        let err = locate_latest_plan(&path).unwrap_err();
        assert!(err.downcast_ref::<PlanNotFoundError>().is_none());
        assert!(err.to_string().contains("read plans dir"));
    }

    #[test]
    fn directory_without_matching_plans_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("notes.md"), "notes").expect("write");
        fs::write(temp.path().join("implementation_plan_.txt"), "x").expect("write");
        let err = locate_latest_plan(temp.path()).unwrap_err();
        assert!(err.downcast_ref::<PlanNotFoundError>().is_some());
    }

    #[test]
    fn selects_newest_by_mtime_not_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        // Lexically last but oldest; lexically first but newest.
        write_plan(temp.path(), "implementation_plan_zzz.md", 0);
        write_plan(temp.path(), "implementation_plan_aaa.md", 100);

        let plan = locate_latest_plan(temp.path()).expect("locate");
        assert_eq!(plan.stem, "implementation_plan_aaa");
        assert!(plan.content.contains("implementation_plan_aaa"));
    }

    #[test]
    fn equal_mtimes_break_ties_lexically() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_plan(temp.path(), "implementation_plan_a.md", 50);
        write_plan(temp.path(), "implementation_plan_b.md", 50);

        let plan = locate_latest_plan(temp.path()).expect("locate");
        assert_eq!(plan.stem, "implementation_plan_b");
    }
}
