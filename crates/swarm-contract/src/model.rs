//! Domain results produced by the stages
//!
//! These are what the orchestrator owns for one pipeline iteration. They are
//! built once from a decoded wire response plus local ground truth and are
//! not mutated afterwards.

use crate::grounding::GroundingWarning;
use crate::schema::{FixAction, Issue, NextAction, OracleNextAction, Verdict};
use serde::{Deserialize, Serialize};

/// Auditor output: grounded issues, most severe first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditResult {
    /// Audited file
    pub file_path: String,
    /// Oracle's one-paragraph assessment
    pub summary: String,
    /// Grounded issues, most severe first
    pub issues: Vec<Issue>,
    /// The oracle could not judge the file on its own
    pub needs_context: bool,
    /// Issue count after the grounding filter
    pub total_issues: usize,
    /// Issues dropped or adjusted by the grounding filter
    pub grounding_warnings: Vec<GroundingWarning>,
    /// Static-analysis score observed before any fix
    pub baseline_score: Option<f64>,
}

impl AuditResult {
    /// Has nothing to fix
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// One change recorded by the Fixer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixChange {
    /// Issue this change addresses
    pub issue_id: String,
    /// Replaced span of the original file
    pub old_code: String,
    /// Span that replaced it
    pub new_code: String,
    /// Oracle's summary of the change
    pub reason: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
}

/// Fixer counters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FixSummary {
    /// Issues committed
    pub issues_fixed: u32,
    /// Issues declined or refused
    pub issues_skipped: u32,
    /// Wall time of the stage
    pub total_time_seconds: f64,
}

/// Fixer output after the write gate has run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixReport {
    /// Effective action (downgraded to SKIP when the gate refused)
    pub action: FixAction,
    /// Target file
    pub file: String,
    /// Committed changes; at most one
    pub changes: Vec<FixChange>,
    /// Counters
    pub summary: FixSummary,
    /// What the pipeline should do next
    pub next_recommendation: String,
    /// The Judge must run before the fix is trusted
    pub validation_required: bool,
    /// The oracle proposed FIX but nothing was committed
    pub write_error: bool,
    /// Why the gate refused, when it did
    pub gate_reason: Option<String>,
    /// Oracle notes
    pub notes: String,
}

impl FixReport {
    /// Report for a no-op
    #[must_use]
    pub fn skip(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: FixAction::Skip,
            file: file.into(),
            changes: Vec::new(),
            summary: FixSummary::default(),
            next_recommendation: reason.into(),
            validation_required: false,
            write_error: false,
            gate_reason: None,
            notes: String::new(),
        }
    }

    /// Was the file on disk changed
    #[inline]
    #[must_use]
    pub fn committed(&self) -> bool {
        self.action == FixAction::Fix && !self.write_error
    }
}

/// Test signal observed by the Judge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TestResults {
    /// Passing tests
    pub passed_count: u32,
    /// Failing or erroring tests
    pub failed_count: u32,
    /// `None` when no tests exist or the runner failed
    pub tests_passed: Option<bool>,
    /// Raw runner output
    pub output: String,
}

/// Quality signal observed by the Judge
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Current static-analysis score (0.0 when the tool failed)
    pub score: f64,
    /// Score before this fix
    pub previous_score: Option<f64>,
    /// `score - previous_score`
    pub improvement: Option<f64>,
    /// Static-analysis findings
    pub total_issues: u32,
}

/// Security counts, as reported by the Judge oracle
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityAssessment {
    /// Critical findings
    pub critical_issues: u32,
    /// Medium findings
    pub medium_issues: u32,
    /// Low findings
    pub low_issues: u32,
    /// Suggested follow-ups
    pub recommendations: Vec<String>,
}

/// Judge output after the threshold engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// Final verdict
    pub verdict: Verdict,
    /// What the oracle said before any override
    pub oracle_verdict: Verdict,
    /// Companion test signal
    pub test_results: TestResults,
    /// Static-analysis signal
    pub quality_metrics: QualityMetrics,
    /// Oracle security counts
    pub security_assessment: SecurityAssessment,
    /// Guidance for the next Fixer attempt
    pub feedback: String,
    /// Oracle's reasons for its verdict
    pub reasons: Vec<String>,
    /// Pipeline action derived from the final verdict
    pub next_action: NextAction,
    /// Action the oracle suggested
    pub oracle_next_action: OracleNextAction,
    /// Present when a threshold rule decided the verdict
    pub verdict_override: Option<String>,
}

impl ValidationResult {
    /// Did the threshold engine change the oracle's verdict
    #[inline]
    #[must_use]
    pub fn was_overridden(&self) -> bool {
        self.verdict != self.oracle_verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_report_commits_nothing() {
        let report = FixReport::skip("a.py", "no issues found in audit");
        assert_eq!(report.action, FixAction::Skip);
        assert_eq!(report.summary.issues_fixed, 0);
        assert!(!report.committed());
        assert!(report.changes.is_empty());
    }

    #[test]
    fn fix_report_with_write_error_is_not_committed() {
        let mut report = FixReport::skip("a.py", "");
        report.action = FixAction::Fix;
        assert!(report.committed());
        report.write_error = true;
        assert!(!report.committed());
    }
}
