//! Fixer stage
//!
//! Repairs exactly one issue per call. The oracle's candidate goes through
//! the write gate; a refused candidate becomes an effective SKIP with
//! `write_error` set, and the file is left untouched.

use super::StageContext;
use crate::error::SwarmError;
use crate::gate;
use crate::inference::AgentRole;
use crate::prioritizer;
use crate::prompts;
use std::path::Path;
use std::time::Instant;
use swarm_contract::prelude::*;
use swarm_contract::{AuditResult, FixAction, FixChange, FixReport, FixResponse, FixSummary};
use swarm_log::LogStatus;

const ROLE: AgentRole = AgentRole::Fixer;

/// Repairs one issue at a time
#[derive(Debug, Clone)]
pub struct Fixer {
    ctx: StageContext,
}

impl Fixer {
    /// Create fixer
    #[must_use]
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    /// Fix the highest-priority issue of an audit
    ///
    /// A clean audit yields SKIP without calling the oracle.
    ///
    /// # Errors
    /// As [`Fixer::fix_issue`].
    pub async fn fix_file(&self, path: &Path, audit: &AuditResult) -> Result<FixReport, SwarmError> {
        match prioritizer::select(&audit.issues) {
            Some(issue) => self.fix_issue(path, issue, None).await,
            None => {
                tracing::info!(file = %path.display(), "no issues to fix");
                Ok(FixReport::skip(path.display().to_string(), "no issues found in audit"))
            }
        }
    }

    /// Fix one issue
    ///
    /// # Errors
    /// - `SwarmError::Io` if the file cannot be read (no oracle call is made)
    /// - `SwarmError::Inference` if the oracle call fails
    /// - `SwarmError::Contract` if the response breaks the FIX schema
    pub async fn fix_issue(
        &self,
        path: &Path,
        issue: &Issue,
        feedback: Option<&str>,
    ) -> Result<FixReport, SwarmError> {
        let started = Instant::now();
        let file = path.display().to_string();

        let original = self
            .ctx
            .workspace
            .read(path)
            .await
            .ok_or_else(|| SwarmError::io(path))?;

        tracing::info!(file = %file, issue = %issue.id, severity = %issue.severity, "fixing");

        let prompt = prompts::render(&prompts::fix_payload(&file, &original, issue, feedback));
        let base = |response: &str| {
            self.ctx
                .entry(ROLE, &prompt, response)
                .with_detail("file_fixed", file.clone())
                .with_detail("issue_addressed", issue.id.clone())
                .with_detail("issue_severity", issue.severity.to_string())
        };

        let raw = match self.ctx.call(ROLE, &prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                self.ctx
                    .record(base("").with_detail("error", err.to_string()), LogStatus::Failed, started)
                    .await;
                return Err(err.into());
            }
        };

        let response = match parse_response(&FixParser, &raw, &ParseContext::new(&original)) {
            Ok(response) => response,
            Err(err) => {
                self.ctx
                    .record(base(&raw).with_detail("error", err.to_string()), LogStatus::Failed, started)
                    .await;
                return Err(err.into());
            }
        };

        let mut report = self.decide(path, &original, issue, &response).await;
        report.summary.total_time_seconds = started.elapsed().as_secs_f64();

        let status = if report.write_error {
            LogStatus::Failed
        } else {
            LogStatus::Success
        };
        self.ctx
            .record(
                base(&raw)
                    .with_detail("action_taken", report.action.to_string())
                    .with_detail("issues_fixed", report.summary.issues_fixed)
                    .with_detail("confidence", response.confidence)
                    .with_detail("write_error", report.write_error)
                    .with_detail("gate_reason", report.gate_reason.clone()),
                status,
                started,
            )
            .await;

        tracing::info!(file = %file, action = %report.action, write_error = report.write_error, "fix complete");
        Ok(report)
    }

    /// Turn a decoded response into a report, writing through the gate
    async fn decide(
        &self,
        path: &Path,
        original: &str,
        issue: &Issue,
        response: &FixResponse,
    ) -> FixReport {
        let file = path.display().to_string();

        if response.is_no_change() {
            let mut report = FixReport::skip(file, "oracle declined the issue");
            report.summary.issues_skipped = 1;
            report.notes.clone_from(&response.notes);
            return report;
        }

        if response.confidence < self.ctx.config.min_fix_confidence {
            tracing::info!(issue = %issue.id, confidence = response.confidence, "fix confidence too low");
            let mut report = FixReport::skip(file, "confidence below threshold, human review needed");
            report.action = FixAction::RequestClarification;
            report.summary.issues_skipped = 1;
            report.notes.clone_from(&response.notes);
            return report;
        }

        match gate::apply(
            self.ctx.workspace.as_ref(),
            path,
            &response.updated_code,
            &issue.id,
            &response.fixed_issue_id,
        )
        .await
        {
            Ok(()) => {
                let (old_code, new_code) = changed_span(original, &response.updated_code);
                FixReport {
                    action: FixAction::Fix,
                    file,
                    changes: vec![FixChange {
                        issue_id: issue.id.clone(),
                        old_code,
                        new_code,
                        reason: response.changes_summary.clone(),
                        confidence: response.confidence,
                    }],
                    summary: FixSummary {
                        issues_fixed: 1,
                        issues_skipped: 0,
                        total_time_seconds: 0.0,
                    },
                    next_recommendation: "validate with the judge".to_string(),
                    validation_required: true,
                    write_error: false,
                    gate_reason: None,
                    notes: response.notes.clone(),
                }
            }
            Err(rejection) => {
                let mut report = FixReport::skip(file, "candidate rejected by write gate");
                report.summary.issues_skipped = 1;
                report.write_error = true;
                report.gate_reason = Some(rejection.to_string());
                report.notes.clone_from(&response.notes);
                report
            }
        }
    }
}

/// Lines that differ between two versions, as `(old, new)`
///
/// Strips the common leading and trailing lines.
#[must_use]
pub fn changed_span(old: &str, new: &str) -> (String, String) {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    let prefix = old_lines
        .iter()
        .zip(&new_lines)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old_lines.len().min(new_lines.len()) - prefix;
    let suffix = old_lines
        .iter()
        .rev()
        .zip(new_lines.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    (
        old_lines[prefix..old_lines.len() - suffix].join("\n"),
        new_lines[prefix..new_lines.len() - suffix].join("\n"),
    )
}
