//! Verdict extraction from review reports.
//!
//! Every review report must contain a marker line of the form
//! `Overall Match: Yes` or `Overall Match: No`. Matching is case-insensitive
//! and tolerant of colon/whitespace variations; the first marker line in the
//! document wins. A report with no marker line at all is unparseable, which
//! the pipeline treats as fatal rather than defaulting to either verdict.

use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)overall\s+match").expect("keyword regex should be valid"));
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(yes|no)\b").expect("token regex should be valid"));

/// Two-valued review outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("pass"),
            Verdict::Fail => f.write_str("fail"),
        }
    }
}

/// Report text contained no `Overall Match` marker line.
#[derive(Debug, Clone)]
pub struct UnparseableVerdictError {
    pub report_path: PathBuf,
}

impl fmt::Display for UnparseableVerdictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no 'Overall Match: Yes|No' line found in {}",
            self.report_path.display()
        )
    }
}

impl std::error::Error for UnparseableVerdictError {}

/// Scan report text for the first verdict marker line.
///
/// A marker line contains the `overall match` keyword followed somewhere on
/// the same line by a yes/no token; a keyword line without a token is skipped
/// rather than treated as a verdict. Returns `None` when no line qualifies;
/// callers decide whether that is fatal.
pub fn parse_verdict(report: &str) -> Option<Verdict> {
    for line in report.lines() {
        let Some(keyword) = KEYWORD_RE.find(line) else {
            continue;
        };
        if let Some(caps) = TOKEN_RE.captures(&line[keyword.end()..]) {
            let token = caps.get(1).expect("token regex has one group").as_str();
            return Some(if token.eq_ignore_ascii_case("yes") {
                Verdict::Pass
            } else {
                Verdict::Fail
            });
        }
    }
    None
}
