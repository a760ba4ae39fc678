//! File and tooling collaborator
//!
//! Reads and writes the file under repair and runs the static-analysis and
//! test tools. Implementations decide where files live and which tools run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One static-analysis finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisMessage {
    /// 1-based line, if reported
    pub line: Option<u32>,
    /// Tool message id, e.g. `W0611`
    pub message_id: String,
    /// Symbolic name, e.g. `unused-import`
    pub symbol: String,
    /// Human-readable text
    pub message: String,
}

impl std::fmt::Display for AnalysisMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "line {line}: {}: {} ({})",
                self.message_id, self.message, self.symbol
            ),
            None => write!(f, "{}: {} ({})", self.message_id, self.message, self.symbol),
        }
    }
}

/// Static-analysis result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Quality score on a 0..=10 scale
    pub score: Option<f64>,
    /// Findings
    pub messages: Vec<AnalysisMessage>,
}

impl AnalysisReport {
    /// Score, with an unknown score counted as zero
    #[inline]
    #[must_use]
    pub fn score_or_zero(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }

    /// Number of findings
    #[inline]
    #[must_use]
    pub fn total_issues(&self) -> usize {
        self.messages.len()
    }

    /// First `limit` findings as text, one per line
    #[must_use]
    pub fn render(&self, limit: usize) -> String {
        self.messages
            .iter()
            .take(limit)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Test-run result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    /// Passing tests
    pub passed: u32,
    /// Failing or erroring tests
    pub failed: u32,
    /// Raw runner output
    pub output: String,
}

impl TestReport {
    /// Pass/fail signal of the run; `None` when no test ran
    #[inline]
    #[must_use]
    pub fn outcome(&self) -> Option<bool> {
        (self.passed > 0 || self.failed > 0).then_some(self.failed == 0)
    }
}

/// Failure to run a tool
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Executable not found
    #[error("{tool} is not installed")]
    NotInstalled { tool: String },

    /// Tool ran but its output could not be used
    #[error("{tool} failed: {message}")]
    Failed { tool: String, message: String },

    /// Path outside the workspace
    #[error("path outside workspace: {0}")]
    OutsideWorkspace(PathBuf),
}

/// File/tooling collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Workspace: Send + Sync {
    /// File content, or `None` when unreadable
    async fn read(&self, path: &Path) -> Option<String>;

    /// Replace file content; `false` on any failure
    async fn write(&self, path: &Path, content: &str) -> bool;

    /// Does a file exist
    async fn exists(&self, path: &Path) -> bool;

    /// Run static analysis on a file
    ///
    /// # Errors
    /// `ToolError` if the analyzer cannot run.
    async fn static_analysis(&self, path: &Path) -> Result<AnalysisReport, ToolError>;

    /// Run the tests in a test file
    ///
    /// # Errors
    /// `ToolError` if the test runner cannot run.
    async fn run_tests(&self, test_path: &Path) -> Result<TestReport, ToolError>;
}

/// Candidate locations of the test file for `path`, most specific first
///
/// `pkg/calc.py` yields `pkg/test_calc.py`, `pkg/tests/test_calc.py` and
/// `tests/test_calc.py` next to `pkg`.
#[must_use]
pub fn companion_test_paths(path: &Path) -> Vec<PathBuf> {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };
    if stem.starts_with("test_") {
        return Vec::new();
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("py");
    let name = format!("test_{stem}.{ext}");
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    let mut candidates = vec![dir.join(&name), dir.join("tests").join(&name)];
    if let Some(parent) = dir.parent() {
        candidates.push(parent.join("tests").join(&name));
    }
    candidates
}
