//! Orchestration loop
//!
//! Drives one file through the [`PipelineState`] machine and always ends in
//! `DONE` or `ESCALATE` with a recorded reason. Stage errors are recovered
//! here; nothing propagates out of [`Orchestrator::run`].
//!
//! Two counters bound the loop:
//! - per-issue attempts, spent when a Fixer response breaks the contract or
//!   is refused by the write gate
//! - RETRY rounds, spent when the Judge asks for another pass

use crate::prioritizer;
use crate::stages::{Auditor, Fixer, Judge, StageContext};
use crate::state_machine::{validate_transition, PipelineState};
use serde::Serialize;
use std::path::Path;
use swarm_contract::{FixAction, FixReport, Issue, ValidationResult, Verdict};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    /// Nothing left to fix, or the Judge accepted the file
    Done,
    /// Handed back for a human, with the reported action
    Escalate {
        /// `SKIP` or `REQUEST_CLARIFICATION`
        action: FixAction,
        /// Why the run stopped
        reason: String,
    },
}

/// One step of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// State left
    pub from: PipelineState,
    /// State entered
    pub to: PipelineState,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    /// File the pipeline ran on
    pub file: String,
    /// `Done` or `Escalate`
    pub final_state: PipelineState,
    /// How the run ended
    pub disposition: Disposition,
    /// Every transition taken, in order
    pub transitions: Vec<Transition>,
    /// Issue ids handed to the Fixer, in order
    pub attempted: Vec<String>,
    /// Issue ids whose fix was written
    pub fixed: Vec<String>,
    /// Issue ids given up on
    pub skipped: Vec<String>,
    /// Most recent Judge result
    pub last_validation: Option<ValidationResult>,
    /// Static score before any fix
    pub baseline_score: Option<f64>,
    /// Static score after the last validation
    pub final_score: Option<f64>,
}

impl PipelineReport {
    fn new(file: String) -> Self {
        Self {
            file,
            final_state: PipelineState::Audit,
            disposition: Disposition::Done,
            transitions: Vec::new(),
            attempted: Vec::new(),
            fixed: Vec::new(),
            skipped: Vec::new(),
            last_validation: None,
            baseline_score: None,
            final_score: None,
        }
    }

    /// Report for a run that never got to finish
    #[must_use]
    pub fn aborted(file: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut report = Self::new(file.into());
        report.final_state = PipelineState::Escalate;
        report.disposition = Disposition::Escalate {
            action: FixAction::Skip,
            reason: reason.into(),
        };
        report
    }

    /// Did the run end in `DONE`
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.final_state == PipelineState::Done
    }

    /// States visited, starting with `AUDIT`
    #[must_use]
    pub fn states(&self) -> Vec<PipelineState> {
        let mut states = vec![PipelineState::Audit];
        states.extend(self.transitions.iter().map(|t| t.to));
        states
    }

    /// Last verdict decided by the Judge and thresholds
    #[must_use]
    pub fn last_verdict(&self) -> Option<Verdict> {
        self.last_validation.as_ref().map(|v| v.verdict)
    }
}

/// State owned by one run
struct Run {
    state: PipelineState,
    report: PipelineReport,
    ranked: Vec<Issue>,
    current: Option<Issue>,
    attempts: u32,
    rounds: u32,
    feedback: Option<String>,
    needs_context: bool,
    clarification: bool,
    reason: Option<String>,
}

impl Run {
    fn new(file: String) -> Self {
        Self {
            state: PipelineState::Audit,
            report: PipelineReport::new(file),
            ranked: Vec::new(),
            current: None,
            attempts: 0,
            rounds: 0,
            feedback: None,
            needs_context: false,
            clarification: false,
            reason: None,
        }
    }

    fn goto(&mut self, to: PipelineState) {
        let from = self.state;
        let to = match validate_transition(from, to) {
            Ok(()) => to,
            Err(err) => {
                tracing::error!(file = %self.report.file, error = %err, "illegal transition, escalating");
                self.reason.get_or_insert_with(|| err.to_string());
                PipelineState::Escalate
            }
        };
        tracing::debug!(file = %self.report.file, %from, %to, "transition");
        self.report.transitions.push(Transition { from, to });
        self.state = to;
    }

    fn escalate(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(file = %self.report.file, state = %self.state, reason = %reason, "escalating");
        self.reason = Some(reason);
        self.goto(PipelineState::Escalate);
    }

    fn current_id(&self) -> String {
        self.current.as_ref().map(|i| i.id.clone()).unwrap_or_default()
    }

    fn finish(mut self) -> PipelineReport {
        self.report.final_state = self.state;
        self.report.disposition = if self.state == PipelineState::Done {
            Disposition::Done
        } else {
            let action = if self.needs_context || self.clarification {
                FixAction::RequestClarification
            } else {
                FixAction::Skip
            };
            Disposition::Escalate {
                action,
                reason: self.reason.unwrap_or_else(|| "escalated".to_string()),
            }
        };
        self.report
    }
}

/// Runs the audit, fix and validate loop for one file at a time
#[derive(Debug, Clone)]
pub struct Orchestrator {
    auditor: Auditor,
    fixer: Fixer,
    judge: Judge,
    max_retries: u32,
}

impl Orchestrator {
    /// Create orchestrator over shared collaborators
    #[must_use]
    pub fn new(ctx: StageContext) -> Self {
        Self {
            max_retries: ctx.config.max_retries,
            auditor: Auditor::new(ctx.clone()),
            fixer: Fixer::new(ctx.clone()),
            judge: Judge::new(ctx),
        }
    }

    /// Process one file until `DONE` or `ESCALATE`
    pub async fn run(&self, path: &Path) -> PipelineReport {
        let mut run = Run::new(path.display().to_string());
        tracing::info!(file = %run.report.file, "pipeline started");

        loop {
            match run.state {
                PipelineState::Audit => self.audit(&mut run, path).await,
                PipelineState::SelectIssue => Self::select(&mut run),
                PipelineState::Fix => self.fix(&mut run, path).await,
                PipelineState::Validate => self.validate(&mut run, path).await,
                PipelineState::Retry => run.goto(PipelineState::SelectIssue),
                PipelineState::Done | PipelineState::Escalate => break,
            }
        }

        let report = run.finish();
        tracing::info!(
            file = %report.file,
            state = %report.final_state,
            fixed = report.fixed.len(),
            "pipeline finished"
        );
        report
    }

    async fn audit(&self, run: &mut Run, path: &Path) {
        let audit = match self.auditor.analyze(path).await {
            Ok(audit) => audit,
            Err(err) => return run.escalate(format!("audit failed: {err}")),
        };

        run.report.baseline_score = audit.baseline_score;
        run.report.final_score = audit.baseline_score;
        run.needs_context = audit.needs_context;

        if audit.is_clean() {
            tracing::info!(file = %run.report.file, "no issues found");
            run.goto(PipelineState::Done);
        } else {
            run.ranked = prioritizer::prioritize(audit.issues);
            run.goto(PipelineState::SelectIssue);
        }
    }

    fn select(run: &mut Run) {
        let next = run
            .ranked
            .iter()
            .find(|issue| !run.report.attempted.contains(&issue.id))
            .cloned();

        match next {
            Some(issue) => {
                tracing::info!(file = %run.report.file, issue = %issue.id, severity = %issue.severity, "issue selected");
                run.attempts = 0;
                run.report.attempted.push(issue.id.clone());
                run.current = Some(issue);
                run.goto(PipelineState::Fix);
            }
            None => run.escalate("issues exhausted"),
        }
    }

    async fn fix(&self, run: &mut Run, path: &Path) {
        let Some(issue) = run.current.clone() else {
            return run.escalate("no issue selected");
        };

        match self.fixer.fix_issue(path, &issue, run.feedback.as_deref()).await {
            Ok(report) if report.committed() => {
                run.report.fixed.push(issue.id);
                run.goto(PipelineState::Validate);
            }
            Ok(report) if report.action == FixAction::RequestClarification => {
                run.clarification = true;
                run.report.skipped.push(issue.id.clone());
                run.escalate(format!("fixer requested clarification for {}: {}", issue.id, report.next_recommendation));
            }
            Ok(report) if report.write_error => {
                self.retry_issue(run, gate_reason(&report));
            }
            Ok(_) => {
                tracing::info!(file = %run.report.file, issue = %issue.id, "fixer declined issue");
                run.report.skipped.push(issue.id);
                run.goto(PipelineState::Retry);
            }
            Err(err) if err.is_retryable() => self.retry_issue(run, err.to_string()),
            Err(err) => run.escalate(format!("fix failed: {err}")),
        }
    }

    /// Spend one attempt on the current issue
    fn retry_issue(&self, run: &mut Run, reason: String) {
        run.attempts += 1;
        let id = run.current_id();
        if run.attempts < self.max_retries {
            tracing::warn!(file = %run.report.file, issue = %id, attempt = run.attempts, reason = %reason, "retrying fix");
            run.goto(PipelineState::Fix);
        } else {
            run.report.skipped.push(id.clone());
            run.escalate(format!("issue {id} failed after {} attempts: {reason}", run.attempts));
        }
    }

    async fn validate(&self, run: &mut Run, path: &Path) {
        let validation = match self.judge.validate(path, run.report.final_score).await {
            Ok(validation) => validation,
            Err(err) => return run.escalate(format!("validation failed: {err}")),
        };

        run.report.final_score = Some(validation.quality_metrics.score);
        let verdict = validation.verdict;
        let explanation = validation
            .verdict_override
            .clone()
            .unwrap_or_else(|| validation.reasons.join("; "));
        let feedback = validation.feedback.clone();
        run.report.last_validation = Some(validation);

        match verdict {
            Verdict::Pass => run.goto(PipelineState::Done),
            Verdict::Retry if run.rounds < self.max_retries => {
                run.rounds += 1;
                tracing::info!(file = %run.report.file, round = run.rounds, "judge requested another round");
                run.feedback = Some(feedback);
                run.goto(PipelineState::Retry);
            }
            Verdict::Retry => run.escalate(format!("retry budget exhausted after {} rounds", run.rounds)),
            Verdict::Fail => run.escalate(format!("judge verdict FAIL: {explanation}")),
        }
    }
}

fn gate_reason(report: &FixReport) -> String {
    report
        .gate_reason
        .clone()
        .unwrap_or_else(|| "write failed".to_string())
}
