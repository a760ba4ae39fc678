//! Local filesystem workspace
//!
//! Files are read and written with `tokio::fs`, confined to a sandbox root.
//! Static analysis runs `pylint --output-format=json2`; tests run
//! `pytest -q`. Paths are checked lexically after resolving them against the
//! current directory; symlinks are not followed for the check.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process::Output;
use std::sync::OnceLock;
use swarm_core::{AnalysisMessage, AnalysisReport, TestReport, ToolError, Workspace};
use tokio::process::Command;

/// Default static analyzer executable
pub const PYLINT: &str = "pylint";
/// Default test runner executable
pub const PYTEST: &str = "pytest";

/// Sandboxed workspace on the local disk
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
    pylint: String,
    pytest: String,
}

impl LocalWorkspace {
    /// Create workspace confined to `root`
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: absolute(root.as_ref()),
            pylint: PYLINT.to_string(),
            pytest: PYTEST.to_string(),
        }
    }

    /// Use another static analyzer executable
    #[must_use]
    pub fn with_pylint(mut self, program: impl Into<String>) -> Self {
        self.pylint = program.into();
        self
    }

    /// Use another test runner executable
    #[must_use]
    pub fn with_pytest(mut self, program: impl Into<String>) -> Self {
        self.pytest = program.into();
        self
    }

    /// Sandbox root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path and check it stays inside the sandbox
    ///
    /// # Errors
    /// `ToolError::OutsideWorkspace` when it escapes the root.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, ToolError> {
        let resolved = absolute(path);
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(ToolError::OutsideWorkspace(path.to_path_buf()))
        }
    }

    async fn run(&self, program: &str, args: &[&str], target: &Path) -> Result<Output, ToolError> {
        tracing::debug!(program, target = %target.display(), "running tool");
        Command::new(program)
            .args(args)
            .arg(target)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    ToolError::NotInstalled {
                        tool: program.to_string(),
                    }
                } else {
                    ToolError::Failed {
                        tool: program.to_string(),
                        message: e.to_string(),
                    }
                }
            })
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    async fn read(&self, path: &Path) -> Option<String> {
        let path = match self.resolve(path) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(error = %err, "read refused");
                return None;
            }
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Some(content),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "read failed");
                None
            }
        }
    }

    async fn write(&self, path: &Path, content: &str) -> bool {
        let path = match self.resolve(path) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(error = %err, "write refused");
                return false;
            }
        };

        let tmp = temp_sibling(&path);
        let result = async {
            tokio::fs::write(&tmp, content).await?;
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "write failed");
                let _ = tokio::fs::remove_file(&tmp).await;
                false
            }
        }
    }

    async fn exists(&self, path: &Path) -> bool {
        match self.resolve(path) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn static_analysis(&self, path: &Path) -> Result<AnalysisReport, ToolError> {
        let path = self.resolve(path)?;
        let output = self.run(&self.pylint, &["--output-format=json2"], &path).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        // pylint exits non-zero whenever it reports anything
        parse_pylint_json(&stdout).map_err(|message| ToolError::Failed {
            tool: self.pylint.clone(),
            message: if output.status.success() {
                message
            } else {
                format!("{message}; stderr: {}", String::from_utf8_lossy(&output.stderr).trim())
            },
        })
    }

    async fn run_tests(&self, test_path: &Path) -> Result<TestReport, ToolError> {
        let test_path = self.resolve(test_path)?;
        let output = self.run(&self.pytest, &["-q"], &test_path).await?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        pytest_report(output.status.code(), text).map_err(|message| ToolError::Failed {
            tool: self.pytest.clone(),
            message,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PylintReport {
    #[serde(default)]
    messages: Vec<PylintMessage>,
    statistics: PylintStatistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PylintMessage {
    #[serde(default)]
    message_id: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    message: String,
    line: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PylintStatistics {
    score: Option<f64>,
}

/// Decode `pylint --output-format=json2` output
///
/// # Errors
/// A description of why the output is not a pylint report.
pub fn parse_pylint_json(stdout: &str) -> Result<AnalysisReport, String> {
    let report: PylintReport =
        serde_json::from_str(stdout.trim()).map_err(|e| format!("unreadable pylint output: {e}"))?;

    Ok(AnalysisReport {
        score: report.statistics.score,
        messages: report
            .messages
            .into_iter()
            .map(|m| AnalysisMessage {
                line: m.line,
                message_id: m.message_id,
                symbol: m.symbol,
                message: m.message,
            })
            .collect(),
    })
}

/// `(passed, failed)` from the pytest summary line
///
/// Errors count as failures. Returns `None` when no counts are present.
#[must_use]
pub fn parse_pytest_summary(output: &str) -> Option<(u32, u32)> {
    static COUNT: OnceLock<Option<Regex>> = OnceLock::new();
    let re = COUNT
        .get_or_init(|| Regex::new(r"(\d+) (passed|failed|errors?)\b").ok())
        .as_ref()?;

    let line = output.lines().rev().find(|line| re.is_match(line))?;
    let (mut passed, mut failed) = (0, 0);
    for caps in re.captures_iter(line) {
        let n: u32 = caps[1].parse().ok()?;
        match &caps[2] {
            "passed" => passed += n,
            _ => failed += n,
        }
    }
    Some((passed, failed))
}

/// Test report from a pytest exit code and its combined output
///
/// Exit code 5 means nothing was collected: the report is empty and its
/// [`TestReport::outcome`] unknown.
fn pytest_report(exit_code: Option<i32>, output: String) -> Result<TestReport, String> {
    let (passed, failed) = if exit_code == Some(5) {
        (0, 0)
    } else {
        parse_pytest_summary(&output).ok_or_else(|| "no summary line in pytest output".to_string())?
    };
    Ok(TestReport {
        passed,
        failed,
        output,
    })
}

/// Absolute, lexically normalized form of `path`
fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.swarm.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pylint_json2_is_decoded() {
        let stdout = r#"{
            "messages": [{
                "type": "warning", "symbol": "unused-import", "message": "Unused import os",
                "messageId": "W0611", "confidence": "UNDEFINED", "module": "calc", "obj": "",
                "line": 1, "column": 0, "endLine": 1, "endColumn": 9,
                "path": "calc.py", "absolutePath": "/tmp/calc.py"
            }],
            "statistics": {"messageTypeCount": {"warning": 1}, "modulesLinted": 1, "score": 8.75}
        }"#;

        let report = parse_pylint_json(stdout).unwrap();
        assert_eq!(report.score, Some(8.75));
        assert_eq!(report.messages[0].to_string(), "line 1: W0611: Unused import os (unused-import)");
    }

    #[test]
    fn pylint_garbage_is_an_error() {
        assert!(parse_pylint_json("************* Module calc").is_err());
    }

    #[test]
    fn pytest_summary_counts() {
        assert_eq!(parse_pytest_summary("....\n4 passed in 0.02s\n"), Some((4, 0)));
        assert_eq!(
            parse_pytest_summary("F..\nFAILED test_calc.py::t\n1 failed, 2 passed in 0.1s"),
            Some((2, 1))
        );
        assert_eq!(parse_pytest_summary("2 passed, 1 error in 0.3s"), Some((2, 1)));
        assert_eq!(parse_pytest_summary("collected nothing"), None);
    }

    #[test]
    fn nothing_collected_is_an_unknown_outcome() {
        let report = pytest_report(Some(5), "no tests ran in 0.01s\n".into()).unwrap();
        assert_eq!((report.passed, report.failed), (0, 0));
        assert_eq!(report.outcome(), None);

        let failing = pytest_report(Some(1), "1 failed, 2 passed in 0.1s".into()).unwrap();
        assert_eq!(failing.outcome(), Some(false));
        assert!(pytest_report(Some(2), "interrupted".into()).is_err());
    }

    #[test]
    fn normalization_removes_dot_segments() {
        assert_eq!(absolute(Path::new("/a/b/../c/./d.py")), PathBuf::from("/a/c/d.py"));
    }

    #[test]
    fn escaping_paths_are_refused() {
        let ws = LocalWorkspace::new("/srv/sandbox");
        assert!(ws.resolve(Path::new("/srv/sandbox/pkg/a.py")).is_ok());
        assert!(matches!(
            ws.resolve(Path::new("/srv/sandbox/../secrets.py")),
            Err(ToolError::OutsideWorkspace(_))
        ));
        assert!(ws.resolve(Path::new("/srv/sandbox-other/a.py")).is_err());
    }

    #[test]
    fn temp_file_is_a_hidden_sibling() {
        assert_eq!(temp_sibling(Path::new("/s/calc.py")), PathBuf::from("/s/.calc.py.swarm.tmp"));
    }
}
