//! Verdict threshold engine
//!
//! Deterministic rules applied after the Judge oracle has answered. The
//! oracle's verdict is advisory; these rules may replace it, and every
//! replacement is recorded next to the original verdict.
//!
//! Rules, in order:
//! 1. score below the fail floor, failing tests, or critical security
//!    findings force FAIL (all applicable reasons are recorded)
//! 2. score at or above the pass floor with passing or unknown tests
//!    forces PASS
//! 3. otherwise the oracle's verdict stands

use crate::config::Thresholds;
use serde::{Deserialize, Serialize};
use swarm_contract::{NextAction, Verdict};

/// Reason recorded when the score is under the fail floor
pub const REASON_LOW_SCORE: &str = "quality score below floor";
/// Reason recorded when tests fail
pub const REASON_TESTS_FAILED: &str = "tests failed";
/// Reason recorded when critical security findings remain
pub const REASON_CRITICAL_SECURITY: &str = "critical security issues present";
/// Reason recorded when the thresholds promote a verdict to PASS
pub const REASON_MEETS_PASS_FLOOR: &str = "quality score and tests meet pass floor";

/// Measured signals for one validation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySignals {
    /// Static-analysis score, 0..=10
    pub quality_score: f64,
    /// `None` when no tests exist
    pub tests_passed: Option<bool>,
    /// Critical security findings
    pub critical_security_issues: u32,
}

/// Outcome of the threshold engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictDecision {
    /// Effective verdict
    pub verdict: Verdict,
    /// Verdict the oracle stated
    pub oracle_verdict: Verdict,
    /// Why the thresholds replaced the oracle's verdict
    pub override_reason: Option<String>,
}

impl VerdictDecision {
    /// Did the thresholds change the verdict
    #[inline]
    #[must_use]
    pub fn overridden(&self) -> bool {
        self.verdict != self.oracle_verdict
    }
}

/// Threshold engine
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdEngine {
    thresholds: Thresholds,
}

impl ThresholdEngine {
    /// Create engine with floors
    #[inline]
    #[must_use]
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Decide the effective verdict
    #[must_use]
    pub fn evaluate(&self, signals: QualitySignals, oracle_verdict: Verdict) -> VerdictDecision {
        let score = if signals.quality_score.is_finite() {
            signals.quality_score
        } else {
            0.0
        };

        let mut failures = Vec::new();
        if score < self.thresholds.fail_below {
            failures.push(REASON_LOW_SCORE);
        }
        if signals.tests_passed == Some(false) {
            failures.push(REASON_TESTS_FAILED);
        }
        if signals.critical_security_issues > 0 {
            failures.push(REASON_CRITICAL_SECURITY);
        }

        let (verdict, reason) = if !failures.is_empty() {
            (Verdict::Fail, Some(failures.join("; ")))
        } else if score >= self.thresholds.pass_at {
            (Verdict::Pass, Some(REASON_MEETS_PASS_FLOOR.to_string()))
        } else {
            (oracle_verdict, None)
        };

        let decision = VerdictDecision {
            verdict,
            oracle_verdict,
            override_reason: reason.filter(|_| verdict != oracle_verdict),
        };

        if let Some(reason) = &decision.override_reason {
            tracing::info!(
                oracle = %oracle_verdict,
                effective = %decision.verdict,
                score,
                reason = %reason,
                "verdict overridden by thresholds"
            );
        }

        decision
    }
}

/// Effective next step for a verdict
#[must_use]
pub fn next_action(verdict: Verdict, tests_passed: Option<bool>) -> NextAction {
    match verdict {
        Verdict::Pass => NextAction::Terminate,
        Verdict::Retry => NextAction::ContinueRefactoring,
        Verdict::Fail if tests_passed == Some(false) => NextAction::FixTests,
        Verdict::Fail => NextAction::Terminate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn signals(score: f64, tests: Option<bool>) -> QualitySignals {
        QualitySignals {
            quality_score: score,
            tests_passed: tests,
            critical_security_issues: 0,
        }
    }

    fn engine() -> ThresholdEngine {
        ThresholdEngine::default()
    }

    #[test]
    fn low_score_and_failing_tests_override_pass() {
        let decision = engine().evaluate(signals(6.5, Some(false)), Verdict::Pass);
        assert_eq!(decision.verdict, Verdict::Fail);
        assert_eq!(decision.oracle_verdict, Verdict::Pass);
        let reason = decision.override_reason.unwrap();
        assert!(reason.contains(REASON_LOW_SCORE));
        assert!(reason.contains(REASON_TESTS_FAILED));
    }

    #[test]
    fn failing_tests_fail_despite_high_score() {
        let decision = engine().evaluate(signals(9.5, Some(false)), Verdict::Pass);
        assert_eq!(decision.verdict, Verdict::Fail);
        assert_eq!(decision.override_reason.as_deref(), Some(REASON_TESTS_FAILED));
    }

    #[test]
    fn high_score_with_unknown_tests_passes() {
        let decision = engine().evaluate(signals(8.0, None), Verdict::Retry);
        assert_eq!(decision.verdict, Verdict::Pass);
        assert_eq!(decision.override_reason.as_deref(), Some(REASON_MEETS_PASS_FLOOR));
    }

    #[test]
    fn agreement_records_no_override() {
        let decision = engine().evaluate(signals(9.0, Some(true)), Verdict::Pass);
        assert!(!decision.overridden());
        assert_eq!(decision.override_reason, None);
    }

    #[test]
    fn middle_band_keeps_oracle_verdict() {
        for oracle in [Verdict::Pass, Verdict::Fail, Verdict::Retry] {
            let decision = engine().evaluate(signals(7.5, Some(true)), oracle);
            assert_eq!(decision.verdict, oracle);
            assert!(!decision.overridden());
        }
    }

    #[test]
    fn critical_security_forces_fail() {
        let mut s = signals(9.0, Some(true));
        s.critical_security_issues = 1;
        let decision = engine().evaluate(s, Verdict::Pass);
        assert_eq!(decision.verdict, Verdict::Fail);
        assert_eq!(decision.override_reason.as_deref(), Some(REASON_CRITICAL_SECURITY));
    }

    #[test]
    fn nan_score_counts_as_zero() {
        let decision = engine().evaluate(signals(f64::NAN, None), Verdict::Pass);
        assert_eq!(decision.verdict, Verdict::Fail);
    }

    #[test]
    fn next_action_mapping() {
        assert_eq!(next_action(Verdict::Pass, None), NextAction::Terminate);
        assert_eq!(next_action(Verdict::Retry, Some(true)), NextAction::ContinueRefactoring);
        assert_eq!(next_action(Verdict::Fail, Some(false)), NextAction::FixTests);
        assert_eq!(next_action(Verdict::Fail, None), NextAction::Terminate);
    }

    fn arb_verdict() -> impl Strategy<Value = Verdict> {
        prop_oneof![Just(Verdict::Pass), Just(Verdict::Fail), Just(Verdict::Retry)]
    }

    fn arb_tests() -> impl Strategy<Value = Option<bool>> {
        prop_oneof![Just(None), Just(Some(true)), Just(Some(false))]
    }

    proptest! {
        #[test]
        fn prop_below_floor_always_fails(score in 0.0f64..7.0, tests in arb_tests(), oracle in arb_verdict()) {
            let decision = engine().evaluate(signals(score, tests), oracle);
            prop_assert_eq!(decision.verdict, Verdict::Fail);
        }

        #[test]
        fn prop_above_pass_floor_with_green_tests_passes(score in 8.0f64..=10.0, oracle in arb_verdict()) {
            let decision = engine().evaluate(signals(score, Some(true)), oracle);
            prop_assert_eq!(decision.verdict, Verdict::Pass);
        }

        #[test]
        fn prop_override_iff_reason(score in 0.0f64..=10.0, tests in arb_tests(), oracle in arb_verdict()) {
            let decision = engine().evaluate(signals(score, tests), oracle);
            prop_assert_eq!(decision.overridden(), decision.override_reason.is_some());
        }

        #[test]
        fn prop_is_deterministic(score in 0.0f64..=10.0, tests in arb_tests(), oracle in arb_verdict()) {
            let a = engine().evaluate(signals(score, tests), oracle);
            let b = engine().evaluate(signals(score, tests), oracle);
            prop_assert_eq!(a, b);
        }
    }
}
