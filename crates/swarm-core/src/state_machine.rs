//! Pipeline state machine
//!
//! ```text
//! AUDIT ─► SELECT_ISSUE ─► FIX ─► VALIDATE ─► DONE
//!   │           ▲  │       │ ▲       │
//!   │           │  │       └─┘       │
//!   │           └──┴── RETRY ◄───────┤
//!   └──────────────────────────────► ESCALATE
//! ```
//!
//! `FIX → FIX` is a bounded retry of the same issue after a contract or gate
//! failure. `FIX → RETRY` moves on after the Fixer declined the issue.

use crate::error::SwarmError;
use serde::{Deserialize, Serialize};

/// Orchestration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    /// Run the Auditor
    Audit,
    /// Pick the next ranked issue
    SelectIssue,
    /// Run the Fixer on the selected issue
    Fix,
    /// Run the Judge and apply thresholds
    Validate,
    /// Another round was granted
    Retry,
    /// Finished successfully
    Done,
    /// Finished without success
    Escalate,
}

impl PipelineState {
    /// Is this a terminal state
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Escalate)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PipelineState::Audit => "AUDIT",
            PipelineState::SelectIssue => "SELECT_ISSUE",
            PipelineState::Fix => "FIX",
            PipelineState::Validate => "VALIDATE",
            PipelineState::Retry => "RETRY",
            PipelineState::Done => "DONE",
            PipelineState::Escalate => "ESCALATE",
        })
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: PipelineState) -> &'static [PipelineState] {
    use PipelineState::*;
    match from {
        Audit => &[SelectIssue, Done, Escalate],
        SelectIssue => &[Fix, Escalate],
        Fix => &[Fix, Validate, Retry, Escalate],
        Validate => &[Done, Retry, Escalate],
        Retry => &[SelectIssue, Escalate],
        Done | Escalate => &[],
    }
}

/// Validate a transition
///
/// # Errors
/// `SwarmError::InvalidTransition` if `to` is not reachable from `from`.
pub fn validate_transition(from: PipelineState, to: PipelineState) -> Result<(), SwarmError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(SwarmError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use PipelineState::*;

    const ALL: [PipelineState; 7] = [Audit, SelectIssue, Fix, Validate, Retry, Done, Escalate];

    #[test]
    fn audit_transitions() {
        assert!(validate_transition(Audit, SelectIssue).is_ok());
        assert!(validate_transition(Audit, Done).is_ok());
        assert!(validate_transition(Audit, Escalate).is_ok());
        assert!(validate_transition(Audit, Fix).is_err());
    }

    #[test]
    fn terminal_states_are_closed() {
        for to in ALL {
            assert!(validate_transition(Done, to).is_err());
            assert!(validate_transition(Escalate, to).is_err());
        }
        assert!(Done.is_terminal() && Escalate.is_terminal());
    }

    #[test]
    fn every_non_terminal_state_can_escalate() {
        for from in ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(validate_transition(from, Escalate).is_ok(), "{from} cannot escalate");
        }
    }

    #[test]
    fn done_is_only_reached_from_audit_or_validate() {
        let sources: Vec<_> = ALL
            .into_iter()
            .filter(|from| allowed_transitions(*from).contains(&Done))
            .collect();
        assert_eq!(sources, [Audit, Validate]);
    }

    #[test]
    fn state_names_match_wire_spelling() {
        assert_eq!(SelectIssue.to_string(), "SELECT_ISSUE");
        assert_eq!(serde_json::to_value(SelectIssue).unwrap(), "SELECT_ISSUE");
    }

    proptest! {
        #[test]
        fn prop_validation_agrees_with_table(
            from in proptest::sample::select(ALL.to_vec()),
            to in proptest::sample::select(ALL.to_vec()),
        ) {
            let allowed = allowed_transitions(from).contains(&to);
            prop_assert_eq!(validate_transition(from, to).is_ok(), allowed);
        }
    }
}
