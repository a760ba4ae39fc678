//! Issue prioritizer
//!
//! Orders issues by severity alone, CRITICAL first. The sort is stable:
//! issues of equal severity keep their input order, never reordered by type
//! or line. The target of an iteration is always the first issue.

use swarm_contract::Issue;

/// Issues stably sorted by severity rank
#[must_use]
pub fn prioritize(mut issues: Vec<Issue>) -> Vec<Issue> {
    issues.sort_by_key(|issue| issue.severity.rank());
    issues
}

/// Highest-priority issue, if any
#[must_use]
pub fn select(issues: &[Issue]) -> Option<&Issue> {
    issues.iter().min_by_key(|issue| issue.severity.rank())
}
