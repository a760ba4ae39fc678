//! Log invariant checker
//!
//! Offline completeness audit: every entry whose `action` is a prompt action
//! must carry `details.input_prompt` and `details.output_response`. Works on
//! raw JSON so that logs written by other tools can be checked too. Never
//! mutates its input.

use crate::entry::ExperimentLogEntry;
use crate::error::LogError;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Actions whose entries must record the exchange
pub const PROMPT_ACTIONS: &[&str] = &["ANALYSIS", "CODE_ANALYSIS", "FIX", "DEBUG"];

/// Keys every prompt entry must carry in `details`
pub const REQUIRED_DETAIL_KEYS: &[&str] = &["input_prompt", "output_response"];

/// One broken invariant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    /// Top-level value is not a list
    #[error("log must be a JSON list")]
    NotAList,

    /// Entry is not an object
    #[error("entry[{index}] must be an object")]
    EntryNotObject { index: usize },

    /// Prompt entry has no `details` object
    #[error("entry[{index}] details must be an object")]
    DetailsNotObject { index: usize },

    /// Prompt entry lacks required detail keys
    #[error("entry[{index}] missing required detail keys: {}", keys.join(", "))]
    MissingDetailKeys { index: usize, keys: Vec<String> },
}

impl Violation {
    /// Offending entry index, if the violation is entry-level
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Violation::NotAList => None,
            Violation::EntryNotObject { index }
            | Violation::DetailsNotObject { index }
            | Violation::MissingDetailKeys { index, .. } => Some(*index),
        }
    }
}

/// Result of a check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Entries inspected
    pub entries: usize,
    /// Every violation found, in entry order
    pub violations: Vec<Violation>,
}

impl CheckReport {
    /// No violations
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check a decoded log
#[must_use]
pub fn check_value(log: &Value) -> CheckReport {
    let Some(items) = log.as_array() else {
        return CheckReport {
            entries: 0,
            violations: vec![Violation::NotAList],
        };
    };

    let mut violations = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let Some(entry) = item.as_object() else {
            violations.push(Violation::EntryNotObject { index });
            continue;
        };

        let is_prompt = entry
            .get("action")
            .and_then(Value::as_str)
            .is_some_and(|a| PROMPT_ACTIONS.contains(&a));
        if !is_prompt {
            continue;
        }

        let Some(details) = entry.get("details").and_then(Value::as_object) else {
            violations.push(Violation::DetailsNotObject { index });
            continue;
        };

        let missing: Vec<String> = REQUIRED_DETAIL_KEYS
            .iter()
            .filter(|key| !details.contains_key(**key))
            .map(|key| (*key).to_string())
            .collect();
        if !missing.is_empty() {
            violations.push(Violation::MissingDetailKeys {
                index,
                keys: missing,
            });
        }
    }

    CheckReport {
        entries: items.len(),
        violations,
    }
}

/// Check typed entries
#[must_use]
pub fn check_entries(entries: &[ExperimentLogEntry]) -> CheckReport {
    match serde_json::to_value(entries) {
        Ok(value) => check_value(&value),
        Err(_) => CheckReport {
            entries: entries.len(),
            violations: vec![Violation::NotAList],
        },
    }
}

/// Check a persisted log; `Ok(None)` when the file does not exist yet
///
/// # Errors
/// `LogError::Io` if the file cannot be read, `LogError::Corrupt` if it is
/// not JSON at all.
pub fn check_file(path: &Path) -> Result<Option<CheckReport>, LogError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|e| LogError::io(path, e))?;
    let value: Value = serde_json::from_str(&text).map_err(|e| LogError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let report = check_value(&value);
    if report.is_ok() {
        tracing::info!(path = %path.display(), entries = report.entries, "experiment log complete");
    } else {
        tracing::warn!(
            path = %path.display(),
            violations = report.violations.len(),
            "experiment log has violations"
        );
    }
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn fix_entry_without_output_is_rejected_with_index() {
        let log = json!([
            {"action": "ANALYSIS", "details": {"input_prompt": "p", "output_response": "r"}},
            {"action": "FIX", "details": {"input_prompt": "p"}},
        ]);
        let report = check_value(&log);
        assert_eq!(
            report.violations,
            vec![Violation::MissingDetailKeys {
                index: 1,
                keys: vec!["output_response".to_string()]
            }]
        );
        assert_eq!(report.violations[0].index(), Some(1));
    }

    #[test]
    fn non_prompt_actions_are_not_checked() {
        let log = json!([{"action": "GENERATION", "details": {}}, {"action": "FIX"}]);
        let report = check_value(&log);
        assert_eq!(report.violations, vec![Violation::DetailsNotObject { index: 1 }]);
    }

    #[test]
    fn every_violation_is_reported() {
        let log = json!([
            42,
            {"action": "DEBUG", "details": "oops"},
            {"action": "CODE_ANALYSIS", "details": {}},
        ]);
        let report = check_value(&log);
        let indices: Vec<_> = report.violations.iter().filter_map(Violation::index).collect();
        assert_eq!(indices, [0, 1, 2]);
        assert_eq!(report.entries, 3);
    }

    #[test]
    fn object_root_is_not_a_list() {
        assert_eq!(check_value(&json!({})).violations, vec![Violation::NotAList]);
    }

    #[test]
    fn missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(check_file(&dir.path().join("absent.json")).unwrap(), None);
    }

    #[test]
    fn violation_display() {
        let v = Violation::MissingDetailKeys {
            index: 4,
            keys: vec!["input_prompt".into(), "output_response".into()],
        };
        assert_eq!(
            v.to_string(),
            "entry[4] missing required detail keys: input_prompt, output_response"
        );
    }
}
