//! Swarm Log - Experiment Log
//!
//! Append-only record of every oracle round-trip made by the pipeline, and
//! the offline checker that audits it for completeness.
//!
//! # Core Operations
//!
//! - **Append**: [`ExperimentLog::append`] adds one entry and, under a file
//!   lock, rewrites the persisted JSON list atomically
//! - **Read**: [`ExperimentLog::entries`] snapshots the ordered entries
//! - **Check**: [`check_value`] / [`check_file`] verify that every prompt
//!   entry carries `input_prompt` and `output_response`
//!
//! The log is the only state shared between concurrently running pipelines.
//! Entries are never edited or reordered once appended.
//!
//! # Example
//!
//! ```rust
//! use swarm_log::{ExperimentLog, ExperimentLogEntry, LogAction, LogStatus};
//!
//! let log = ExperimentLog::in_memory();
//! let entry = ExperimentLogEntry::new("Auditor_Agent", "gemini-2.5-flash", LogAction::Analysis)
//!     .with_exchange("analyze this", "{\"issues\": []}")
//!     .with_status(LogStatus::Success);
//! log.append(entry).unwrap();
//!
//! assert!(swarm_log::check_entries(&log.entries()).is_ok());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod checker;
pub mod entry;
pub mod error;
pub mod log;

pub use checker::{
    check_entries, check_file, check_value, CheckReport, Violation, PROMPT_ACTIONS,
    REQUIRED_DETAIL_KEYS,
};
pub use entry::{ExperimentLogEntry, LogAction, LogStatus};
pub use error::LogError;
pub use log::ExperimentLog;

/// Default location of the persisted log
pub const DEFAULT_LOG_PATH: &str = "logs/experiment_data.json";
