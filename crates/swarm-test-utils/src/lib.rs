//! Testing utilities for the refactor swarm workspace
//!
//! Deterministic stand-ins for the oracle and the file/tooling collaborator,
//! plus builders for oracle responses.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use swarm_core::{
    AgentRole, AnalysisReport, InferenceClient, InferenceError, InferenceRequest, StageContext,
    SwarmConfig, TestReport, ToolError, Workspace,
};
use swarm_log::ExperimentLog;

/// Oracle that replays a fixed script of answers, in call order
#[derive(Debug, Default)]
pub struct ScriptedInference {
    script: Mutex<VecDeque<Result<String, InferenceError>>>,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, text: impl Into<String>) -> Self {
        self.script.lock().push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, err: InferenceError) -> Self {
        self.script.lock().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn roles(&self) -> Vec<AgentRole> {
        self.requests.lock().iter().map(|r| r.role).collect()
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl InferenceClient for ScriptedInference {
    async fn invoke(&self, request: InferenceRequest) -> Result<String, InferenceError> {
        self.requests.lock().push(request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(InferenceError::Transport("script exhausted".into())))
    }
}

/// In-memory files with scripted tool results
#[derive(Debug)]
pub struct MemoryWorkspace {
    files: Mutex<HashMap<PathBuf, String>>,
    writes: Mutex<Vec<(PathBuf, String)>>,
    scores: Mutex<VecDeque<f64>>,
    last_score: Mutex<Option<f64>>,
    tests: Mutex<HashMap<PathBuf, TestReport>>,
    refuse_writes: bool,
    analysis_fails: bool,
}

impl Default for MemoryWorkspace {
    fn default() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            scores: Mutex::new(VecDeque::new()),
            last_score: Mutex::new(None),
            tests: Mutex::new(HashMap::new()),
            refuse_writes: false,
            analysis_fails: false,
        }
    }
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.lock().insert(path.into(), content.into());
        self
    }

    /// Scores returned by successive static-analysis runs; the last repeats
    pub fn with_scores(self, scores: &[f64]) -> Self {
        self.scores.lock().extend(scores);
        self
    }

    pub fn with_tests(self, path: impl Into<PathBuf>, passed: u32, failed: u32) -> Self {
        let report = TestReport {
            passed,
            failed,
            output: format!("{failed} failed, {passed} passed"),
        };
        let path = path.into();
        self.files.lock().insert(path.clone(), String::new());
        self.tests.lock().insert(path, report);
        self
    }

    pub fn refusing_writes(mut self) -> Self {
        self.refuse_writes = true;
        self
    }

    pub fn without_analyzer(mut self) -> Self {
        self.analysis_fails = true;
        self
    }

    pub fn content(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl Workspace for MemoryWorkspace {
    async fn read(&self, path: &Path) -> Option<String> {
        self.files.lock().get(path).cloned()
    }

    async fn write(&self, path: &Path, content: &str) -> bool {
        if self.refuse_writes {
            return false;
        }
        self.writes.lock().push((path.to_path_buf(), content.to_string()));
        self.files.lock().insert(path.to_path_buf(), content.to_string());
        true
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    async fn static_analysis(&self, _path: &Path) -> Result<AnalysisReport, ToolError> {
        if self.analysis_fails {
            return Err(ToolError::NotInstalled {
                tool: "pylint".into(),
            });
        }
        let mut last = self.last_score.lock();
        if let Some(score) = self.scores.lock().pop_front() {
            *last = Some(score);
        }
        Ok(AnalysisReport {
            score: *last,
            messages: Vec::new(),
        })
    }

    async fn run_tests(&self, test_path: &Path) -> Result<TestReport, ToolError> {
        self.tests
            .lock()
            .get(test_path)
            .cloned()
            .ok_or_else(|| ToolError::Failed {
                tool: "pytest".into(),
                message: format!("no tests at {}", test_path.display()),
            })
    }
}

/// Stage context over test doubles with an in-memory log
pub fn context(
    inference: Arc<ScriptedInference>,
    workspace: Arc<MemoryWorkspace>,
    config: SwarmConfig,
) -> StageContext {
    StageContext::new(
        inference,
        workspace,
        Arc::new(ExperimentLog::in_memory()),
        Arc::new(config),
    )
}

// Oracle response builders

pub fn issue(id: &str, severity: &str, line: u32, evidence: &str) -> Value {
    json!({
        "id": id,
        "severity": severity,
        "type": "RUNTIME",
        "line": line,
        "message": format!("problem near line {line}"),
        "evidence": evidence,
        "suggested_fix": "fix it",
    })
}

pub fn audit_json(file: &str, issues: Vec<Value>) -> String {
    json!({
        "file_path": file,
        "summary": format!("{} issue(s)", issues.len()),
        "issues": issues,
        "needs_context": false,
    })
    .to_string()
}

pub fn fix_json(file: &str, issue_id: &str, updated_code: &str) -> String {
    json!({
        "file_path": file,
        "fixed_issue_id": issue_id,
        "changes_summary": format!("fixed {issue_id}"),
        "updated_code": updated_code,
        "notes": "",
        "confidence": 0.9,
    })
    .to_string()
}

pub fn no_change_json(file: &str, issue_id: &str, original: &str) -> String {
    json!({
        "file_path": file,
        "fixed_issue_id": issue_id,
        "changes_summary": swarm_contract::NO_CHANGE,
        "updated_code": original,
        "notes": "not a real problem",
    })
    .to_string()
}

pub fn judge_json(file: &str, verdict: &str) -> String {
    json!({
        "file_path": file,
        "verdict": verdict,
        "reasons": [format!("judged {verdict}")],
        "next_action": if verdict == "PASS" { "STOP" } else { "TRY_NEXT_ISSUE" },
        "feedback": format!("feedback for {verdict}"),
    })
    .to_string()
}
