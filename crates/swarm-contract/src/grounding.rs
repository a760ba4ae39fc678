//! Grounding filter for Auditor issues
//!
//! An issue is kept only if its `evidence` is a literal substring of the
//! analyzed code or of the static-analysis output handed to the oracle.
//! Unverifiable issues are dropped with a warning; they never fail the whole
//! response. Line numbers outside the file are cleared rather than trusted.

use crate::schema::Issue;
use serde::{Deserialize, Serialize};

/// Why an issue was dropped or adjusted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    /// `evidence` was empty
    MissingEvidence,
    /// `evidence` does not occur in the code or tool output
    EvidenceNotFound,
    /// `line` was outside `[1, lines_count]` and was cleared
    LineOutOfRange { line: i64, lines_count: usize },
}

/// Non-fatal, issue-level grounding finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingWarning {
    /// Affected issue
    pub issue_id: String,
    #[serde(flatten)]
    pub kind: WarningKind,
}

impl GroundingWarning {
    /// Does this warning mean the issue was removed
    #[inline]
    #[must_use]
    pub fn dropped_issue(&self) -> bool {
        !matches!(self.kind, WarningKind::LineOutOfRange { .. })
    }
}

/// Checks issues against the texts the oracle was shown
#[derive(Debug, Clone, Copy)]
pub struct GroundingFilter<'a> {
    source: &'a str,
    tool_output: &'a str,
}

impl<'a> GroundingFilter<'a> {
    /// Create filter over code and tool output
    #[inline]
    #[must_use]
    pub fn new(source: &'a str, tool_output: &'a str) -> Self {
        Self {
            source,
            tool_output,
        }
    }

    /// Is this evidence quoted verbatim from a known text
    #[must_use]
    pub fn is_grounded(&self, evidence: &str) -> bool {
        let needle = evidence.trim();
        if needle.is_empty() {
            return false;
        }
        self.source.contains(needle) || self.tool_output.contains(needle)
    }

    /// Check one issue
    ///
    /// # Errors
    /// Returns the warning describing why the issue must be dropped.
    pub fn check(&self, issue: &Issue) -> Result<(), GroundingWarning> {
        if issue.evidence.trim().is_empty() {
            return Err(GroundingWarning {
                issue_id: issue.id.clone(),
                kind: WarningKind::MissingEvidence,
            });
        }
        if !self.is_grounded(&issue.evidence) {
            return Err(GroundingWarning {
                issue_id: issue.id.clone(),
                kind: WarningKind::EvidenceNotFound,
            });
        }
        Ok(())
    }

    /// Keep grounded issues in their original order
    #[must_use]
    pub fn filter(&self, issues: Vec<Issue>) -> (Vec<Issue>, Vec<GroundingWarning>) {
        let mut kept = Vec::with_capacity(issues.len());
        let mut warnings = Vec::new();

        for issue in issues {
            match self.check(&issue) {
                Ok(()) => kept.push(issue),
                Err(warning) => {
                    tracing::warn!(
                        issue_id = %warning.issue_id,
                        kind = ?warning.kind,
                        "dropping ungrounded issue"
                    );
                    warnings.push(warning);
                }
            }
        }

        (kept, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IssueType, Severity};

    const CODE: &str = "def div(a, b):\n    return a / b\n";
    const TOOLS: &str = "C0116: Missing function or method docstring";

    fn issue(id: &str, evidence: &str) -> Issue {
        Issue::new(id, Severity::High, IssueType::Runtime).with_evidence(evidence)
    }

    #[test]
    fn evidence_from_code_is_grounded() {
        let filter = GroundingFilter::new(CODE, TOOLS);
        assert!(filter.check(&issue("A", "return a / b")).is_ok());
    }

    #[test]
    fn evidence_from_tool_output_is_grounded() {
        let filter = GroundingFilter::new(CODE, TOOLS);
        assert!(filter.check(&issue("A", "Missing function or method docstring")).is_ok());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let filter = GroundingFilter::new(CODE, TOOLS);
        assert!(filter.check(&issue("A", "   return a / b  \n")).is_ok());
    }

    #[test]
    fn fabricated_evidence_is_dropped() {
        let filter = GroundingFilter::new(CODE, TOOLS);
        let err = filter.check(&issue("A", "eval(user_input)")).unwrap_err();
        assert_eq!(err.kind, WarningKind::EvidenceNotFound);
        assert!(err.dropped_issue());
    }

    #[test]
    fn filter_preserves_order_of_kept_issues() {
        let filter = GroundingFilter::new(CODE, TOOLS);
        let (kept, warnings) = filter.filter(vec![
            issue("A", "def div(a, b):"),
            issue("B", "not in the file"),
            issue("C", "return a / b"),
            issue("D", ""),
        ]);
        let ids: Vec<_> = kept.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["A", "C"]);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[1].kind, WarningKind::MissingEvidence);
    }
}
