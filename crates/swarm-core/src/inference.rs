//! Inference service boundary
//!
//! The oracle is reached through one narrow call: a role-tagged request in,
//! raw text out. Everything nondeterministic lives behind
//! [`InferenceClient`], so tests substitute scripted implementations without
//! touching orchestration logic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use swarm_log::LogAction;

/// Pipeline role making the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    /// Finds issues
    Auditor,
    /// Repairs one issue
    Fixer,
    /// Validates a repair
    Judge,
}

impl AgentRole {
    /// Name recorded in the experiment log
    #[inline]
    #[must_use]
    pub fn agent_name(self) -> &'static str {
        match self {
            AgentRole::Auditor => "Auditor_Agent",
            AgentRole::Fixer => "Fixer_Agent",
            AgentRole::Judge => "Judge_Agent",
        }
    }

    /// Experiment log action for this role's round-trips
    #[inline]
    #[must_use]
    pub fn log_action(self) -> LogAction {
        match self {
            AgentRole::Auditor => LogAction::Analysis,
            AgentRole::Fixer => LogAction::Fix,
            AgentRole::Judge => LogAction::Debug,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AgentRole::Auditor => "auditor",
            AgentRole::Fixer => "fixer",
            AgentRole::Judge => "judge",
        })
    }
}

/// Sampling settings for one call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    /// Create generation config
    #[inline]
    #[must_use]
    pub const fn new(temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            max_output_tokens,
        }
    }
}

/// Speaker of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Pipeline side
    User,
    /// Oracle side
    Model,
}

/// One turn of the conversation sent to the oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Speaker
    pub role: MessageRole,
    /// Text content
    pub content: String,
}

impl Message {
    /// User turn
    #[inline]
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Model turn
    #[inline]
    #[must_use]
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Model,
            content: content.into(),
        }
    }
}

/// Complete request for one oracle round-trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Calling stage
    pub role: AgentRole,
    /// Model identifier
    pub model: String,
    /// System instruction
    pub system_prompt: String,
    /// Conversation turns, oldest first
    pub messages: Vec<Message>,
    /// Sampling settings
    pub generation: GenerationConfig,
}

impl InferenceRequest {
    /// Text of the last user turn, as logged under `input_prompt`
    #[must_use]
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map_or("", |m| m.content.as_str())
    }
}

/// Failure to obtain text from the inference service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    /// No response within the configured bound
    #[error("inference timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection or transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("inference service returned {status}: {message}")]
    Http { status: u16, message: String },

    /// Rate limit or quota exhausted
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Service answered without any candidate text
    #[error("inference service returned no content")]
    EmptyResponse,

    /// Response body could not be decoded
    #[error("malformed service response: {0}")]
    Decode(String),
}

/// Oracle collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Send one request and wait for the complete response text
    ///
    /// # Errors
    /// `InferenceError` on transport, status, quota or decode failures.
    async fn invoke(&self, request: InferenceRequest) -> Result<String, InferenceError>;
}

/// Invoke with an upper time bound
///
/// # Errors
/// `InferenceError::Timeout` when `timeout` elapses first, otherwise whatever
/// the client returns.
pub async fn invoke_with_timeout(
    client: &dyn InferenceClient,
    request: InferenceRequest,
    timeout: Duration,
) -> Result<String, InferenceError> {
    let role = request.role;
    match tokio::time::timeout(timeout, client.invoke(request)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(%role, timeout_secs = timeout.as_secs(), "inference call timed out");
            Err(InferenceError::Timeout {
                secs: timeout.as_secs(),
            })
        }
    }
}
