//! Default system instructions and request payload builders
//!
//! Request payloads are JSON documents so the oracle sees exactly the
//! fields its schema refers to.

use crate::workspace::{AnalysisReport, TestReport};
use serde_json::{json, Value};
use std::borrow::Cow;
use swarm_contract::Issue;

/// Auditor instruction
pub const AUDITOR_SYSTEM_PROMPT: &str = r#"You are the Auditor in a refactoring swarm.

Mission: analyze ONE source file and return the issues worth fixing.

Rules:
- Output valid JSON only. No markdown, no commentary.
- Every issue must be grounded: `evidence` is a short verbatim quote from file_content or from static_analysis.
- If you cannot quote evidence for an issue, leave it out.
- `line` is an integer within [1, lines_count], or null.
- Report high-impact issues first: runtime, logic, security, then style.

Schema:
{
  "file_path": "string",
  "summary": "string",
  "issues": [
    {
      "id": "ISSUE-001",
      "severity": "CRITICAL|HIGH|MEDIUM|LOW",
      "type": "RUNTIME|LOGIC|SECURITY|STYLE|DESIGN|TEST",
      "line": 12,
      "message": "string",
      "evidence": "verbatim quote",
      "suggested_fix": "string"
    }
  ],
  "needs_context": false
}

If nothing is wrong, return "issues": [] and "needs_context": false.
Set "needs_context": true when the file cannot be judged without other files."#;

/// Fixer instruction
pub const FIXER_SYSTEM_PROMPT: &str = r#"You are the Fixer in a refactoring swarm.

Mission: fix exactly ONE selected issue in ONE file with a minimal, safe change.

Rules:
- Output valid JSON only. No markdown, no commentary.
- Fix only the selected issue. Do not touch unrelated code.
- Do not add external dependencies.
- Keep public signatures unless the fix requires changing them.
- `updated_code` is the FULL file after the fix, not a patch, and must parse.
- `fixed_issue_id` is the id of the selected issue.

Schema:
{
  "file_path": "string",
  "fixed_issue_id": "string",
  "changes_summary": "string",
  "updated_code": "string",
  "notes": "string",
  "confidence": 0.9
}

If you cannot fix it safely, set "changes_summary": "NO_CHANGE", return the
original file_content unchanged in "updated_code", and explain why in "notes"."#;

/// Judge instruction
pub const JUDGE_SYSTEM_PROMPT: &str = r#"You are the Judge in a refactoring swarm.

Mission: decide whether the latest fix is acceptable, from tool results.

Rules:
- Output valid JSON only. No markdown, no commentary.
- Failing tests mean FAIL.
- A large drop in quality score or any critical security problem means FAIL.
- PASS when quality improved and no critical problem remains.
- RETRY when the fix helped but another iteration is needed.

Schema:
{
  "file_path": "string",
  "verdict": "PASS|FAIL|RETRY",
  "reasons": ["string"],
  "next_action": "STOP|RE_AUDIT|TRY_NEXT_ISSUE",
  "feedback": "string",
  "security_assessment": {
    "critical_issues": 0,
    "medium_issues": 0,
    "low_issues": 0,
    "recommendations": ["string"]
  }
}"#;

/// Keep head and tail of `code` within `budget` characters
///
/// Cuts on line boundaries and marks the gap with the number of omitted
/// lines.
#[must_use]
pub fn fit_to_budget(code: &str, budget: usize) -> Cow<'_, str> {
    if code.chars().count() <= budget {
        return Cow::Borrowed(code);
    }

    let lines: Vec<&str> = code.lines().collect();
    let head_budget = budget * 2 / 3;
    let tail_budget = budget - head_budget;

    let mut head = 0;
    let mut used = 0;
    for line in &lines {
        let cost = line.chars().count() + 1;
        if used + cost > head_budget {
            break;
        }
        used += cost;
        head += 1;
    }

    let mut tail = 0;
    used = 0;
    for line in lines[head..].iter().rev() {
        let cost = line.chars().count() + 1;
        if used + cost > tail_budget {
            break;
        }
        used += cost;
        tail += 1;
    }

    let omitted = lines.len() - head - tail;
    let mut out = lines[..head].join("\n");
    out.push_str(&format!("\n... [{omitted} lines omitted] ...\n"));
    out.push_str(&lines[lines.len() - tail..].join("\n"));
    Cow::Owned(out)
}

/// Auditor request payload
#[must_use]
pub fn audit_payload(
    file_path: &str,
    code: &str,
    analysis: &AnalysisReport,
    tool_text: &str,
    budget: usize,
) -> Value {
    json!({
        "file_path": file_path,
        "file_content": fit_to_budget(code, budget),
        "file_info": {
            "lines_count": code.lines().count(),
            "size_bytes": code.len(),
        },
        "static_analysis": {
            "score": analysis.score,
            "total_issues": analysis.total_issues(),
            "issues": tool_text,
        },
    })
}

/// Fixer request payload
#[must_use]
pub fn fix_payload(file_path: &str, code: &str, issue: &Issue, feedback: Option<&str>) -> Value {
    let mut payload = json!({
        "file_path": file_path,
        "file_content": code,
        "selected_issue": issue,
    });
    if let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) {
        payload["judge_feedback"] = Value::String(feedback.to_string());
    }
    payload
}

/// Judge request payload
#[must_use]
pub fn judge_payload(
    file_path: &str,
    code: &str,
    previous_score: Option<f64>,
    analysis: &AnalysisReport,
    tool_text: &str,
    tests: Option<&TestReport>,
    budget: usize,
) -> Value {
    let pytest_result = tests.map(|t| {
        json!({
            "passed": t.passed,
            "failed": t.failed,
            "summary": t.output.lines().last().unwrap_or_default(),
        })
    });
    json!({
        "file_path": file_path,
        "previous_static_analysis": { "score": previous_score },
        "current_static_analysis": {
            "score": analysis.score,
            "total_issues": analysis.total_issues(),
            "issues": tool_text,
        },
        "test_result": pytest_result,
        "file_content": fit_to_budget(code, budget),
    })
}

/// Render a payload as the user turn
#[must_use]
pub fn render(payload: &Value) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_contract::{IssueType, Severity};

    #[test]
    fn small_files_are_untouched() {
        let code = "a = 1\nb = 2\n";
        assert!(matches!(fit_to_budget(code, 100), Cow::Borrowed(_)));
    }

    #[test]
    fn large_files_keep_head_and_tail() {
        let code: String = (1..=200).map(|i| format!("line_{i} = {i}\n")).collect();
        let fitted = fit_to_budget(&code, 300);
        assert!(fitted.starts_with("line_1 = 1\n"));
        assert!(fitted.trim_end().ends_with("line_200 = 200"));
        assert!(fitted.contains("lines omitted"));
        assert!(fitted.chars().count() < 400);
    }

    #[test]
    fn fix_payload_carries_issue_and_feedback() {
        let issue = Issue::new("ISSUE-002", Severity::High, IssueType::Logic).with_line(3);
        let payload = fix_payload("a.py", "x = 1\n", &issue, Some("tests still fail"));
        assert_eq!(payload["selected_issue"]["id"], "ISSUE-002");
        assert_eq!(payload["selected_issue"]["type"], "LOGIC");
        assert_eq!(payload["judge_feedback"], "tests still fail");

        let without = fix_payload("a.py", "x = 1\n", &issue, Some("  "));
        assert!(without.get("judge_feedback").is_none());
    }

    #[test]
    fn judge_payload_without_tests_is_null() {
        let payload = judge_payload("a.py", "x = 1\n", Some(6.0), &AnalysisReport::default(), "", None, 1000);
        assert!(payload["test_result"].is_null());
        assert_eq!(payload["previous_static_analysis"]["score"], 6.0);
    }

    #[test]
    fn system_prompts_name_their_schemas() {
        for key in ["needs_context", "evidence", "suggested_fix"] {
            assert!(AUDITOR_SYSTEM_PROMPT.contains(key));
        }
        assert!(FIXER_SYSTEM_PROMPT.contains("NO_CHANGE"));
        assert!(JUDGE_SYSTEM_PROMPT.contains("TRY_NEXT_ISSUE"));
    }
}
