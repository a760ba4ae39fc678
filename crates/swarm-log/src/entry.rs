//! Experiment log entry

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of oracle round-trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogAction {
    /// Auditor analysis
    #[serde(rename = "ANALYSIS", alias = "CODE_ANALYSIS")]
    Analysis,
    /// Fixer repair
    #[serde(rename = "FIX")]
    Fix,
    /// Judge validation
    #[serde(rename = "DEBUG")]
    Debug,
}

impl LogAction {
    /// Wire spelling
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogAction::Analysis => "ANALYSIS",
            LogAction::Fix => "FIX",
            LogAction::Debug => "DEBUG",
        }
    }
}

/// Outcome of the round-trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogStatus {
    /// Response obtained and accepted
    Success,
    /// Inference, parse or schema failure
    Failed,
}

/// One record in the experiment log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentLogEntry {
    /// Agent that made the call, e.g. `Fixer_Agent`
    pub agent_name: String,
    /// Model identifier sent to the inference service
    pub model_used: String,
    /// Kind of round-trip
    pub action: LogAction,
    /// Free-form details; prompt entries carry `input_prompt` and `output_response`
    pub details: IndexMap<String, Value>,
    /// Outcome
    pub status: LogStatus,
    /// When the entry was created
    pub timestamp: DateTime<Utc>,
}

impl ExperimentLogEntry {
    /// Create a successful entry with no details
    #[must_use]
    pub fn new(
        agent_name: impl Into<String>,
        model_used: impl Into<String>,
        action: LogAction,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            model_used: model_used.into(),
            action,
            details: IndexMap::new(),
            status: LogStatus::Success,
            timestamp: Utc::now(),
        }
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: LogStatus) -> Self {
        self.status = status;
        self
    }

    /// With prompt and raw response
    #[must_use]
    pub fn with_exchange(self, input_prompt: impl Into<String>, output_response: impl Into<String>) -> Self {
        self.with_detail("input_prompt", input_prompt.into())
            .with_detail("output_response", output_response.into())
    }

    /// With one detail, replacing any previous value for `key`
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Insert a detail in place
    pub fn insert_detail(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.details.insert(key.into(), value.into());
    }

    /// Lookup a detail
    #[inline]
    #[must_use]
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_wire_names() {
        let entry = ExperimentLogEntry::new("Judge_Agent", "m", LogAction::Debug)
            .with_status(LogStatus::Failed)
            .with_detail("verdict", "FAIL");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["action"], "DEBUG");
        assert_eq!(value["status"], "FAILED");
        assert_eq!(value["details"], json!({"verdict": "FAIL"}));
    }

    #[test]
    fn legacy_action_name_is_accepted() {
        let action: LogAction = serde_json::from_value(json!("CODE_ANALYSIS")).unwrap();
        assert_eq!(action, LogAction::Analysis);
        assert_eq!(action.as_str(), "ANALYSIS");
    }

    #[test]
    fn details_keep_insertion_order() {
        let entry = ExperimentLogEntry::new("Fixer_Agent", "m", LogAction::Fix)
            .with_detail("zeta", 1)
            .with_exchange("p", "r")
            .with_detail("alpha", 2);
        let keys: Vec<_> = entry.details.keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "input_prompt", "output_response", "alpha"]);
    }
}
