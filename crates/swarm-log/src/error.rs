//! Log error types

use std::path::PathBuf;

/// Errors raised while persisting or loading the experiment log
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Filesystem failure
    #[error("log io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entries could not be serialized
    #[error("failed to serialize log: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Another writer held the log file for too long
    #[error("timed out after {secs}s waiting for lock on {}", path.display())]
    LockTimeout { path: PathBuf, secs: u64 },

    /// Persisted file is not a list of entries
    #[error("log file {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
}

impl LogError {
    /// Create io error for a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_path() {
        let err = LogError::io(
            "logs/x.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("logs/x.json"));
    }
}
