//! Wire schemas and their enums
//!
//! The three oracle response shapes (AUDIT, FIX, JUDGE) and the closed
//! vocabularies they may use. Enum decoding goes through [`WireEnum`] so an
//! out-of-vocabulary value becomes a `SchemaError` naming the allowed set.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker value the Fixer uses when it declines to change the file
pub const NO_CHANGE: &str = "NO_CHANGE";

/// Which contract a response is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaTag {
    /// Auditor output
    Audit,
    /// Fixer output
    Fix,
    /// Judge output
    Judge,
}

impl SchemaTag {
    /// Required top-level keys for this schema
    #[must_use]
    pub fn required_keys(self) -> &'static [&'static str] {
        match self {
            SchemaTag::Audit => &["file_path", "summary", "issues", "needs_context"],
            SchemaTag::Fix => &[
                "file_path",
                "fixed_issue_id",
                "changes_summary",
                "updated_code",
                "notes",
            ],
            SchemaTag::Judge => &["file_path", "verdict", "reasons", "next_action"],
        }
    }
}

impl fmt::Display for SchemaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchemaTag::Audit => "AUDIT",
            SchemaTag::Fix => "FIX",
            SchemaTag::Judge => "JUDGE",
        })
    }
}

/// Closed string vocabulary on the wire
pub trait WireEnum: Sized + Copy {
    /// Every accepted wire spelling, in declaration order
    const ALLOWED: &'static [&'static str];

    /// Wire spelling of this value
    fn as_wire(self) -> &'static str;

    /// Decode an exact (case-sensitive) wire spelling
    fn from_wire(value: &str) -> Option<Self>;
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl WireEnum for $name {
            const ALLOWED: &'static [&'static str] = &[$($wire),+];

            fn as_wire(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            fn from_wire(value: &str) -> Option<Self> {
                match value {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_wire())
            }
        }
    };
}

wire_enum! {
    /// Issue severity, most urgent first
    Severity {
        /// Crash, data loss or exploitable flaw
        Critical => "CRITICAL",
        /// Wrong behavior on common paths
        High => "HIGH",
        /// Wrong behavior on edge cases
        Medium => "MEDIUM",
        /// Cosmetic
        Low => "LOW",
    }
}

impl Severity {
    /// Sort rank: CRITICAL=0 … LOW=3
    #[inline]
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }
}

wire_enum! {
    /// Issue category
    IssueType {
        /// Exception or crash at runtime
        Runtime => "RUNTIME",
        /// Incorrect logic
        Logic => "LOGIC",
        /// Security weakness
        Security => "SECURITY",
        /// Style or convention
        Style => "STYLE",
        /// Structural or design concern
        Design => "DESIGN",
        /// Missing or broken tests
        Test => "TEST",
    }
}

wire_enum! {
    /// Judge verdict
    Verdict {
        /// Change accepted
        Pass => "PASS",
        /// Change rejected
        Fail => "FAIL",
        /// Try again with another issue
        Retry => "RETRY",
    }
}

wire_enum! {
    /// Next step the Judge oracle proposes (advisory)
    OracleNextAction {
        /// Stop working on the file
        Stop => "STOP",
        /// Run the Auditor again
        ReAudit => "RE_AUDIT",
        /// Move to the next ranked issue
        TryNextIssue => "TRY_NEXT_ISSUE",
    }
}

wire_enum! {
    /// Effective next step derived from the final verdict
    NextAction {
        /// Pipeline ends for this file
        Terminate => "TERMINATE",
        /// Another fix iteration is warranted
        ContinueRefactoring => "CONTINUE_REFACTORING",
        /// Tests must be repaired first
        FixTests => "FIX_TESTS",
    }
}

wire_enum! {
    /// Fixer action
    FixAction {
        /// A full-file candidate was produced
        Fix => "FIX",
        /// Nothing is written
        Skip => "SKIP",
        /// Human input is needed
        RequestClarification => "REQUEST_CLARIFICATION",
    }
}

/// One problem reported by the Auditor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable identifier, e.g. `ISSUE-001`
    pub id: String,
    /// Severity
    pub severity: Severity,
    /// Category
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    /// 1-based line, or `None` when unknown or out of range
    pub line: Option<u32>,
    /// What is wrong
    pub message: String,
    /// Verbatim quote from the code or tool output
    pub evidence: String,
    /// How to fix it
    pub suggested_fix: String,
}

impl Issue {
    /// Create issue with empty text fields
    #[must_use]
    pub fn new(id: impl Into<String>, severity: Severity, issue_type: IssueType) -> Self {
        Self {
            id: id.into(),
            severity,
            issue_type,
            line: None,
            message: String::new(),
            evidence: String::new(),
            suggested_fix: String::new(),
        }
    }

    /// With line
    #[must_use]
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// With message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// With evidence
    #[must_use]
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }

    /// With suggested fix
    #[must_use]
    pub fn with_suggested_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = fix.into();
        self
    }
}

/// Decoded AUDIT response, after grounding
#[derive(Debug, Clone, PartialEq)]
pub struct AuditResponse {
    /// File the oracle says it audited
    pub file_path: String,
    /// One-paragraph assessment
    pub summary: String,
    /// Grounded issues in oracle order
    pub issues: Vec<Issue>,
    /// The file cannot be judged without other files
    pub needs_context: bool,
    /// Non-fatal, issue-level findings of the grounding filter
    pub warnings: Vec<crate::grounding::GroundingWarning>,
}

/// Decoded FIX response
#[derive(Debug, Clone, PartialEq)]
pub struct FixResponse {
    /// File the oracle says it fixed
    pub file_path: String,
    /// Issue the candidate addresses
    pub fixed_issue_id: String,
    /// Summary, or `NO_CHANGE`
    pub changes_summary: String,
    /// Full candidate file content
    pub updated_code: String,
    /// Free-form notes
    pub notes: String,
    /// Self-reported confidence, clamped to [0, 1]
    pub confidence: f64,
    /// True when the code came from a fenced block after the JSON report
    pub code_from_trailing_block: bool,
}

impl FixResponse {
    /// Did the oracle decline to change anything
    #[inline]
    #[must_use]
    pub fn is_no_change(&self) -> bool {
        self.changes_summary.trim() == NO_CHANGE
    }
}

/// Decoded JUDGE response
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeResponse {
    /// File the oracle says it judged
    pub file_path: String,
    /// Oracle's own verdict
    pub verdict: Verdict,
    /// Justification
    pub reasons: Vec<String>,
    /// Suggested next step
    pub next_action: OracleNextAction,
    /// Guidance for another fix round
    pub feedback: Option<String>,
    /// Security counts, when reported
    pub security_assessment: Option<crate::model::SecurityAssessment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_rank_order() {
        assert!(Severity::Critical.rank() < Severity::High.rank());
        assert!(Severity::High.rank() < Severity::Medium.rank());
        assert!(Severity::Medium.rank() < Severity::Low.rank());
    }

    #[test]
    fn wire_roundtrip_is_case_sensitive() {
        assert_eq!(Severity::from_wire("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::from_wire("critical"), None);
        assert_eq!(IssueType::from_wire("TEST"), Some(IssueType::Test));
        assert_eq!(OracleNextAction::from_wire("RE_AUDIT"), Some(OracleNextAction::ReAudit));
        assert_eq!(FixAction::RequestClarification.as_wire(), "REQUEST_CLARIFICATION");
    }

    #[test]
    fn issue_serializes_type_key() {
        let issue = Issue::new("ISSUE-001", Severity::Low, IssueType::Style).with_line(3);
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["type"], "STYLE");
        assert_eq!(value["severity"], "LOW");
        assert_eq!(value["line"], 3);
    }

    #[test]
    fn no_change_tolerates_whitespace() {
        let response = FixResponse {
            file_path: "a.py".into(),
            fixed_issue_id: "ISSUE-001".into(),
            changes_summary: " NO_CHANGE\n".into(),
            updated_code: String::new(),
            notes: String::new(),
            confidence: 1.0,
            code_from_trailing_block: false,
        };
        assert!(response.is_no_change());
    }

    #[test]
    fn required_keys_match_table() {
        assert_eq!(SchemaTag::Judge.required_keys().len(), 4);
        assert!(SchemaTag::Fix.required_keys().contains(&"updated_code"));
    }
}
