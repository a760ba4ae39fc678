//! Error types for the swarm core
//!
//! Every failure a pipeline can meet maps to one [`SwarmError`] variant:
//! - unreadable files
//! - oracle text that breaks its contract
//! - inference service failures
//! - tool failures, which stages degrade to neutral metrics
//!
//! Configuration problems are a separate [`ConfigError`]: they only occur at
//! startup, before any pipeline exists.

use crate::inference::InferenceError;
use crate::state_machine::PipelineState;
use crate::workspace::ToolError;
use std::path::PathBuf;
use swarm_contract::ContractError;

/// Main swarm error type
#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    /// File could not be read
    #[error("cannot read {}", path.display())]
    Io { path: PathBuf },

    /// Oracle response broke its contract
    #[error("contract violation: {0}")]
    Contract(#[from] ContractError),

    /// Inference service failed
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),

    /// Tool could not run
    #[error("tool failed: {0}")]
    Tool(#[from] ToolError),

    /// The loop attempted a transition outside the state table
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },
}

impl SwarmError {
    /// Create io error for a path
    #[inline]
    pub fn io(path: impl Into<PathBuf>) -> Self {
        Self::Io { path: path.into() }
    }

    /// Is another attempt at the same step worthwhile
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contract(_))
    }

    /// Must the current file be escalated at once
    #[inline]
    #[must_use]
    pub fn requires_escalation(&self) -> bool {
        !self.is_retryable()
    }

    /// Raw oracle text behind a contract failure
    #[must_use]
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Contract(err) => Some(err.raw_response()),
            _ => None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Required credential absent from the environment
    #[error("missing credential: {0} is not set")]
    MissingCredentials(&'static str),

    /// Values are inconsistent
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Result type alias for swarm operations
pub type SwarmResult<T> = Result<T, SwarmError>;

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_contract::{ParseError, SchemaTag};

    #[test]
    fn contract_errors_are_retryable() {
        let err = SwarmError::from(ContractError::Parse {
            schema: SchemaTag::Fix,
            source: ParseError::NoJsonObject,
            raw: "sorry".into(),
        });
        assert!(err.is_retryable());
        assert_eq!(err.raw_response(), Some("sorry"));
    }

    #[test]
    fn inference_errors_escalate() {
        let err = SwarmError::from(InferenceError::Timeout { secs: 60 });
        assert!(err.requires_escalation());
        assert_eq!(err.to_string(), "inference failed: inference timed out after 60s");
    }

    #[test]
    fn missing_credentials_display() {
        let err = ConfigError::MissingCredentials("GOOGLE_API_KEY");
        assert_eq!(err.to_string(), "missing credential: GOOGLE_API_KEY is not set");
    }
}
