//! Stage adapters
//!
//! Each stage turns one oracle round-trip into a typed result:
//! - [`Auditor`]: file → [`AuditResult`](swarm_contract::AuditResult)
//! - [`Fixer`]: file + issue → [`FixReport`](swarm_contract::FixReport), write-gated
//! - [`Judge`]: file → [`ValidationResult`](swarm_contract::ValidationResult), threshold-checked
//!
//! Every round-trip, successful or not, appends exactly one entry to the
//! experiment log with the prompt and the raw response.

use crate::config::SwarmConfig;
use crate::inference::{invoke_with_timeout, AgentRole, InferenceClient, InferenceError, InferenceRequest, Message};
use crate::error::SwarmError;
use crate::workspace::{ToolError, Workspace};
use std::sync::Arc;
use std::time::Instant;
use swarm_log::{ExperimentLog, ExperimentLogEntry, LogStatus};

mod auditor;
mod fixer;
mod judge;

pub use auditor::Auditor;
pub use fixer::{changed_span, Fixer};
pub use judge::Judge;

/// Collaborators shared by the stages of one or many pipelines
#[derive(Clone)]
pub struct StageContext {
    /// Oracle
    pub inference: Arc<dyn InferenceClient>,
    /// Files and tools
    pub workspace: Arc<dyn Workspace>,
    /// Append-only experiment log
    pub log: Arc<ExperimentLog>,
    /// Settings
    pub config: Arc<SwarmConfig>,
}

impl StageContext {
    /// Create stage context
    #[must_use]
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        workspace: Arc<dyn Workspace>,
        log: Arc<ExperimentLog>,
        config: Arc<SwarmConfig>,
    ) -> Self {
        Self {
            inference,
            workspace,
            log,
            config,
        }
    }

    fn request(&self, role: AgentRole, user_prompt: &str) -> InferenceRequest {
        InferenceRequest {
            role,
            model: self.config.model.clone(),
            system_prompt: self.config.system_prompt(role).to_string(),
            messages: vec![Message::user(user_prompt)],
            generation: self.config.generation(role),
        }
    }

    /// One bounded oracle call
    async fn call(&self, role: AgentRole, user_prompt: &str) -> Result<String, InferenceError> {
        let request = self.request(role, user_prompt);
        tracing::debug!(%role, prompt_chars = user_prompt.len(), "calling oracle");
        let result = invoke_with_timeout(
            self.inference.as_ref(),
            request,
            self.config.inference_timeout(),
        )
        .await;
        match &result {
            Ok(text) => tracing::debug!(%role, response_chars = text.len(), "oracle answered"),
            Err(err) => tracing::warn!(%role, error = %err, "oracle call failed"),
        }
        result
    }

    /// Start a log entry for a round-trip
    fn entry(&self, role: AgentRole, prompt: &str, response: &str) -> ExperimentLogEntry {
        ExperimentLogEntry::new(role.agent_name(), self.config.model.clone(), role.log_action())
            .with_exchange(prompt, response)
    }

    /// Replace a failed tool run with its neutral value
    ///
    /// The failure text is kept in `notes` so the log entry shows why the
    /// metrics are neutral.
    fn degrade<T: Default>(file: &str, result: Result<T, ToolError>, notes: &mut Vec<String>) -> T {
        result.unwrap_or_else(|err| {
            let err = SwarmError::from(err);
            tracing::warn!(file, error = %err, "tool unavailable, using neutral metrics");
            notes.push(err.to_string());
            T::default()
        })
    }

    /// Append an entry; a log failure never fails the stage
    ///
    /// File-backed appends lock and rewrite the log file, so they run on the
    /// blocking pool.
    async fn record(&self, mut entry: ExperimentLogEntry, status: LogStatus, started: Instant) {
        entry.insert_detail("elapsed_seconds", started.elapsed().as_secs_f64());
        let entry = entry.with_status(status);
        let log = Arc::clone(&self.log);
        match tokio::task::spawn_blocking(move || log.append(entry)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => tracing::error!(error = %err, "failed to append experiment log entry"),
            Err(err) => tracing::error!(error = %err, "experiment log append task failed"),
        }
    }
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("model", &self.config.model)
            .field("log_entries", &self.log.len())
            .finish_non_exhaustive()
    }
}
