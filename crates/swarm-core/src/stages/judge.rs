//! Judge stage
//!
//! Re-measures the file, runs its companion tests when there are any, asks
//! the oracle for a verdict and passes that verdict through the
//! [`ThresholdEngine`].

use super::StageContext;
use crate::error::SwarmError;
use crate::inference::AgentRole;
use crate::prompts;
use crate::verdict::{self, QualitySignals, ThresholdEngine};
use crate::workspace::{companion_test_paths, AnalysisReport, TestReport};
use std::path::{Path, PathBuf};
use std::time::Instant;
use swarm_contract::prelude::*;
use swarm_contract::{QualityMetrics, TestResults, ValidationResult};
use swarm_log::LogStatus;

const ROLE: AgentRole = AgentRole::Judge;

/// Decides whether a fixed file is acceptable
#[derive(Debug, Clone)]
pub struct Judge {
    ctx: StageContext,
}

impl Judge {
    /// Create judge
    #[must_use]
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    /// Validate a file against the previous score
    ///
    /// # Errors
    /// - `SwarmError::Io` if the file cannot be read (no oracle call is made)
    /// - `SwarmError::Inference` if the oracle call fails
    /// - `SwarmError::Contract` if the response breaks the JUDGE schema
    pub async fn validate(
        &self,
        path: &Path,
        previous_score: Option<f64>,
    ) -> Result<ValidationResult, SwarmError> {
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

        let test_file = self.companion_tests(path).await;
        let tests: Option<TestReport> = match &test_file {
            Some(test_path) => StageContext::degrade(
                &file,
                self.ctx.workspace.run_tests(test_path).await.map(Some),
                &mut tool_errors,
            ),
            None => None,
        };

        let tests_passed = tests.as_ref().and_then(TestReport::outcome);

        tracing::info!(
            file = %file,
            score = ?analysis.score,
            previous = ?previous_score,
            tests = ?tests_passed,
            "validating"
        );

        let prompt = prompts::render(&prompts::judge_payload(
            &file,
            &code,
            previous_score,
            &analysis,
            &tool_text,
            tests.as_ref(),
            config.prompt_budget_chars,
        ));
        let test_name = test_file.as_ref().map(|p| p.display().to_string());
        let base = |response: &str| {
            self.ctx
                .entry(ROLE, &prompt, response)
                .with_detail("file_validated", file.clone())
                .with_detail("test_file", test_name.clone())
                .with_detail("static_score", analysis.score)
                .with_detail("previous_score", previous_score)
                .with_detail("total_issues", analysis.total_issues())
                .with_detail("tests_passed", tests_passed)
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

        let response = match parse_response(&JudgeParser, &raw, &ParseContext::new(&code)) {
            Ok(response) => response,
            Err(err) => {
                self.ctx
                    .record(base(&raw).with_detail("error", err.to_string()), LogStatus::Failed, started)
                    .await;
                return Err(err.into());
            }
        };

        let security = response.security_assessment.clone().unwrap_or_default();
        let signals = QualitySignals {
            quality_score: analysis.score_or_zero(),
            tests_passed,
            critical_security_issues: security.critical_issues,
        };
        let decision = ThresholdEngine::new(config.thresholds).evaluate(signals, response.verdict);

        let score = analysis.score_or_zero();
        let feedback = response
            .feedback
            .clone()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| response.reasons.join("\n"));

        let result = ValidationResult {
            verdict: decision.verdict,
            oracle_verdict: decision.oracle_verdict,
            test_results: tests.map(test_results).unwrap_or_default(),
            quality_metrics: QualityMetrics {
                score,
                previous_score,
                improvement: previous_score.map(|prev| score - prev),
                total_issues: u32::try_from(analysis.total_issues()).unwrap_or(u32::MAX),
            },
            security_assessment: security,
            feedback,
            reasons: response.reasons,
            next_action: verdict::next_action(decision.verdict, tests_passed),
            oracle_next_action: response.next_action,
            verdict_override: decision.override_reason,
        };

        self.ctx
            .record(
                base(&raw)
                    .with_detail("oracle_verdict", result.oracle_verdict.to_string())
                    .with_detail("verdict", result.verdict.to_string())
                    .with_detail("verdict_override", result.verdict_override.clone()),
                LogStatus::Success,
                started,
            )
            .await;

        tracing::info!(
            file = %file,
            verdict = %result.verdict,
            oracle = %result.oracle_verdict,
            overridden = result.was_overridden(),
            "validation complete"
        );
        Ok(result)
    }

    /// First existing companion test file
    async fn companion_tests(&self, path: &Path) -> Option<PathBuf> {
        for candidate in companion_test_paths(path) {
            if self.ctx.workspace.exists(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }
}

fn test_results(report: TestReport) -> TestResults {
    TestResults {
        passed_count: report.passed,
        failed_count: report.failed,
        tests_passed: report.outcome(),
        output: report.output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::MockInferenceClient;
    use crate::stages::test_support::{context, workspace_with};
    use crate::verdict::{REASON_LOW_SCORE, REASON_TESTS_FAILED};
    use crate::workspace::MockWorkspace;
    use pretty_assertions::assert_eq;
    use swarm_contract::NextAction;
    use swarm_log::LogAction;

    const CODE: &str = "def div(a, b):\n    return a / b if b else None\n";

    fn judge_json(verdict: &str) -> String {
        serde_json::json!({
            "file_path": "div.py",
            "verdict": verdict,
            "reasons": ["looks fine"],
            "next_action": "STOP",
        })
        .to_string()
    }

    #[tokio::test]
    async fn oracle_pass_with_low_score_becomes_fail() {
        let mut inference = MockInferenceClient::new();
        inference.expect_invoke().times(1).returning(|_| Ok(judge_json("PASS")));
        let ctx = context(inference, workspace_with(CODE, 6.5));

        let result = Judge::new(ctx.clone())
            .validate(Path::new("div.py"), Some(5.0))
            .await
            .unwrap();

        assert_eq!(result.verdict, Verdict::Fail);
        assert_eq!(result.oracle_verdict, Verdict::Pass);
        assert_eq!(result.verdict_override.as_deref(), Some(REASON_LOW_SCORE));
        assert_eq!(result.quality_metrics.improvement, Some(1.5));
        assert_eq!(result.next_action, NextAction::Terminate);

        let entries = ctx.log.entries();
        assert_eq!(entries[0].action, LogAction::Debug);
        assert_eq!(entries[0].detail("oracle_verdict").unwrap(), "PASS");
        assert_eq!(entries[0].detail("verdict").unwrap(), "FAIL");
    }

    #[tokio::test]
    async fn high_score_promotes_retry_to_pass() {
        let mut inference = MockInferenceClient::new();
        inference.expect_invoke().returning(|_| Ok(judge_json("RETRY")));
        let ctx = context(inference, workspace_with(CODE, 9.1));

        let result = Judge::new(ctx).validate(Path::new("div.py"), None).await.unwrap();
        assert_eq!(result.verdict, Verdict::Pass);
        assert!(result.was_overridden());
        assert_eq!(result.test_results.tests_passed, None);
    }

    #[tokio::test]
    async fn failing_companion_tests_force_fail() {
        let mut inference = MockInferenceClient::new();
        inference.expect_invoke().returning(|_| Ok(judge_json("PASS")));

        let mut workspace = MockWorkspace::new();
        workspace.expect_read().returning(|_| Some(CODE.to_string()));
        workspace
            .expect_static_analysis()
            .returning(|_| Ok(AnalysisReport { score: Some(9.5), messages: Vec::new() }));
        workspace
            .expect_exists()
            .returning(|p| p == Path::new("test_div.py"));
        workspace.expect_run_tests().times(1).returning(|_| {
            Ok(TestReport {
                passed: 3,
                failed: 1,
                output: "1 failed, 3 passed".into(),
            })
        });

        let result = Judge::new(context(inference, workspace))
            .validate(Path::new("div.py"), Some(9.0))
            .await
            .unwrap();

        assert_eq!(result.verdict, Verdict::Fail);
        assert_eq!(result.verdict_override.as_deref(), Some(REASON_TESTS_FAILED));
        assert_eq!(result.test_results.failed_count, 1);
        assert_eq!(result.next_action, NextAction::FixTests);
    }

    #[tokio::test]
    async fn mid_score_keeps_oracle_retry() {
        let mut inference = MockInferenceClient::new();
        inference.expect_invoke().returning(|_| {
            Ok(serde_json::json!({
                "file_path": "div.py", "verdict": "RETRY", "reasons": ["naming"],
                "next_action": "TRY_NEXT_ISSUE", "feedback": "rename helpers"
            })
            .to_string())
        });
        let ctx = context(inference, workspace_with(CODE, 7.5));

        let result = Judge::new(ctx).validate(Path::new("div.py"), Some(7.0)).await.unwrap();
        assert_eq!(result.verdict, Verdict::Retry);
        assert_eq!(result.verdict_override, None);
        assert_eq!(result.feedback, "rename helpers");
        assert_eq!(result.next_action, NextAction::ContinueRefactoring);
    }
}
