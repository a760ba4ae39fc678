//! Auditor stage

use super::StageContext;
use crate::error::SwarmError;
use crate::inference::AgentRole;
use crate::prompts;
use crate::workspace::AnalysisReport;
use std::path::Path;
use std::time::Instant;
use swarm_contract::prelude::*;
use swarm_contract::AuditResult;
use swarm_log::LogStatus;

const ROLE: AgentRole = AgentRole::Auditor;

/// Finds grounded issues in one file
#[derive(Debug, Clone)]
pub struct Auditor {
    ctx: StageContext,
}

impl Auditor {
    /// Create auditor
    #[must_use]
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    /// Analyze a file
    ///
    /// Static-analysis failures degrade to an unknown score; they do not fail
    /// the stage.
    ///
    /// # Errors
    /// - `SwarmError::Io` if the file cannot be read (no oracle call is made)
    /// - `SwarmError::Inference` if the oracle call fails
    /// - `SwarmError::Contract` if the response breaks the AUDIT schema
    pub async fn analyze(&self, path: &Path) -> Result<AuditResult, SwarmError> {
        let started = Instant::now();
        let file = path.display().to_string();
        let config = &self.ctx.config;

        let code = self
            .ctx
            .workspace
            .read(path)
            .await
            .ok_or_else(|| SwarmError::io(path))?;

        let mut tool_errors = Vec::new();
        let analysis: AnalysisReport = StageContext::degrade(
            &file,
            self.ctx.workspace.static_analysis(path).await,
            &mut tool_errors,
        );
        let tool_text = analysis.render(config.max_tool_issues);

        tracing::info!(file = %file, score = ?analysis.score, findings = analysis.total_issues(), "auditing");

        let prompt = prompts::render(&prompts::audit_payload(
            &file,
            &code,
            &analysis,
            &tool_text,
            config.prompt_budget_chars,
        ));

        let base = |response: &str| {
            self.ctx
                .entry(ROLE, &prompt, response)
                .with_detail("file_analyzed", file.clone())
                .with_detail("file_lines", code.lines().count())
                .with_detail("static_score", analysis.score)
                .with_detail("static_issues", analysis.total_issues())
                .with_detail("tool_errors", tool_errors.clone())
        };

        let raw = match self.ctx.call(ROLE, &prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                self.ctx
                    .record(base("").with_detail("error", err.to_string()), LogStatus::Failed, started)
                    .await;
                return Err(err.into());
            }
        };

        let parse_ctx = ParseContext::new(&code).with_tool_output(&tool_text);
        let response = match parse_response(&AuditParser, &raw, &parse_ctx) {
            Ok(response) => response,
            Err(err) => {
                self.ctx
                    .record(base(&raw).with_detail("error", err.to_string()), LogStatus::Failed, started)
                    .await;
                return Err(err.into());
            }
        };

        let dropped = response.warnings.iter().filter(|w| w.dropped_issue()).count();
        self.ctx
            .record(
                base(&raw)
                    .with_detail("issues_found", response.issues.len())
                    .with_detail("issues_dropped", dropped)
                    .with_detail("needs_context", response.needs_context),
                LogStatus::Success,
                started,
            )
            .await;

        tracing::info!(
            file = %file,
            issues = response.issues.len(),
            dropped,
            needs_context = response.needs_context,
            "audit complete"
        );

        Ok(AuditResult {
            file_path: file,
            summary: response.summary,
            total_issues: response.issues.len(),
            issues: response.issues,
            needs_context: response.needs_context,
            grounding_warnings: response.warnings,
            baseline_score: analysis.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{InferenceError, MockInferenceClient};
    use crate::stages::test_support::{context, workspace_with};
    use crate::workspace::MockWorkspace;
    use swarm_log::LogAction;

    const CODE: &str = "def div(a, b):\n    return a / b\n";

    #[tokio::test]
    async fn grounded_issues_are_returned_and_logged() {
        let mut inference = MockInferenceClient::new();
        inference.expect_invoke().times(1).returning(|_| {
            Ok(r#"{"file_path": "div.py", "summary": "s", "needs_context": false, "issues": [
                {"id": "ISSUE-001", "severity": "HIGH", "type": "RUNTIME", "line": 2,
                 "message": "zero division", "evidence": "return a / b", "suggested_fix": "guard"},
                {"id": "ISSUE-002", "severity": "LOW", "type": "STYLE", "line": 1,
                 "message": "invented", "evidence": "import pickle", "suggested_fix": ""}
            ]}"#
            .to_string())
        });
        let ctx = context(inference, workspace_with(CODE, 6.0));
        let audit = Auditor::new(ctx.clone()).analyze(Path::new("div.py")).await.unwrap();

        assert_eq!(audit.total_issues, 1);
        assert_eq!(audit.issues[0].id, "ISSUE-001");
        assert_eq!(audit.baseline_score, Some(6.0));
        assert_eq!(audit.grounding_warnings.len(), 1);

        let entries = ctx.log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, LogAction::Analysis);
        assert_eq!(entries[0].status, LogStatus::Success);
        assert!(entries[0].detail("input_prompt").is_some());
    }

    #[tokio::test]
    async fn unreadable_file_makes_no_call() {
        let mut inference = MockInferenceClient::new();
        inference.expect_invoke().times(0);
        let mut workspace = MockWorkspace::new();
        workspace.expect_read().returning(|_| None);

        let ctx = context(inference, workspace);
        let err = Auditor::new(ctx.clone()).analyze(Path::new("gone.py")).await.unwrap_err();
        assert!(matches!(err, SwarmError::Io { .. }));
        assert!(ctx.log.is_empty());
    }

    #[tokio::test]
    async fn inference_failure_is_logged_as_failed() {
        let mut inference = MockInferenceClient::new();
        inference
            .expect_invoke()
            .returning(|_| Err(InferenceError::QuotaExceeded("429".into())));
        let ctx = context(inference, workspace_with(CODE, 5.0));

        let err = Auditor::new(ctx.clone()).analyze(Path::new("div.py")).await.unwrap_err();
        assert!(matches!(err, SwarmError::Inference(_)));

        let entries = ctx.log.entries();
        assert_eq!(entries[0].status, LogStatus::Failed);
        assert_eq!(entries[0].detail("output_response").unwrap(), "");
    }

    #[tokio::test]
    async fn schema_violation_keeps_raw_text() {
        let mut inference = MockInferenceClient::new();
        inference
            .expect_invoke()
            .returning(|_| Ok(r#"{"file_path": "div.py", "issues": []}"#.to_string()));
        let ctx = context(inference, workspace_with(CODE, 5.0));

        let err = Auditor::new(ctx.clone()).analyze(Path::new("div.py")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.raw_response(), Some(r#"{"file_path": "div.py", "issues": []}"#));
        assert_eq!(ctx.log.entries()[0].status, LogStatus::Failed);
    }
}
