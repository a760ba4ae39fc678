//! Fix application gate
//!
//! A candidate reaches storage only if its code is non-empty, parses for the
//! file's language, and targets exactly the selected issue. The write itself
//! is all-or-nothing.

use crate::workspace::Workspace;
use std::path::Path;
use swarm_contract::{SyntaxChecker, SyntaxError};

/// Why a candidate was not written
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    /// Candidate code is blank
    #[error("updated code is empty")]
    EmptyCode,

    /// Candidate does not parse
    #[error("updated code does not parse: {0}")]
    Syntax(#[from] SyntaxError),

    /// Candidate claims to fix a different issue
    #[error("fix targets issue '{found}' but '{expected}' was selected")]
    IssueMismatch { expected: String, found: String },

    /// Workspace refused the write
    #[error("write failed")]
    WriteFailed,
}

/// Validate a candidate without writing it
///
/// # Errors
/// The first rule the candidate breaks.
pub fn check_candidate(
    path: &Path,
    code: &str,
    selected_issue_id: &str,
    fixed_issue_id: &str,
) -> Result<(), GateRejection> {
    if code.trim().is_empty() {
        return Err(GateRejection::EmptyCode);
    }
    if fixed_issue_id.trim() != selected_issue_id {
        return Err(GateRejection::IssueMismatch {
            expected: selected_issue_id.to_string(),
            found: fixed_issue_id.to_string(),
        });
    }
    SyntaxChecker::check_path(path, code)?;
    Ok(())
}

/// Validate a candidate and write it
///
/// # Errors
/// `GateRejection` if validation fails or the workspace refuses the write.
/// Nothing is written on any error.
pub async fn apply(
    workspace: &dyn Workspace,
    path: &Path,
    code: &str,
    selected_issue_id: &str,
    fixed_issue_id: &str,
) -> Result<(), GateRejection> {
    if let Err(rejection) = check_candidate(path, code, selected_issue_id, fixed_issue_id) {
        tracing::warn!(path = %path.display(), %rejection, "fix rejected by gate");
        return Err(rejection);
    }

    if !workspace.write(path, code).await {
        tracing::warn!(path = %path.display(), "fix write failed");
        return Err(GateRejection::WriteFailed);
    }

    tracing::info!(path = %path.display(), issue = selected_issue_id, "fix committed");
    Ok(())
}
