//! Swarm Core - Auditor / Fixer / Judge orchestration
//!
//! Takes one source file from audit to a validated fix, or to an explicit
//! escalation:
//! - the Auditor finds grounded issues
//! - the Prioritizer picks the most severe one
//! - the Fixer repairs it behind the write gate
//! - the Judge re-measures the file and the thresholds decide the verdict
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use swarm_core::{Orchestrator, StageContext, SwarmConfig};
//! use swarm_log::ExperimentLog;
//!
//! # async fn example(
//! #     inference: Arc<dyn swarm_core::InferenceClient>,
//! #     workspace: Arc<dyn swarm_core::Workspace>,
//! # ) {
//! let config = Arc::new(SwarmConfig::new());
//! let log = Arc::new(ExperimentLog::in_memory());
//! let ctx = StageContext::new(inference, workspace, log, config);
//!
//! let report = Orchestrator::new(ctx).run("sandbox/calc.py".as_ref()).await;
//! println!("{} -> {}", report.file, report.final_state);
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

// Core modules
pub mod batch;
pub mod config;
pub mod error;
pub mod gate;
pub mod inference;
pub mod orchestrator;
pub mod prioritizer;
pub mod prompts;
pub mod stages;
pub mod state_machine;
pub mod verdict;
pub mod workspace;

// Re-exports for convenience
pub use batch::{BatchReport, BatchRunner, DEFAULT_CONCURRENCY};
pub use config::{Credentials, PromptSet, SwarmConfig, Thresholds};
pub use error::{ConfigError, SwarmError, SwarmResult};
pub use gate::GateRejection;
pub use inference::{
    invoke_with_timeout, AgentRole, GenerationConfig, InferenceClient, InferenceError,
    InferenceRequest, Message, MessageRole,
};
pub use orchestrator::{Disposition, Orchestrator, PipelineReport, Transition};
pub use stages::{Auditor, Fixer, Judge, StageContext};
pub use state_machine::{allowed_transitions, validate_transition, PipelineState};
pub use verdict::{QualitySignals, ThresholdEngine, VerdictDecision};
pub use workspace::{AnalysisMessage, AnalysisReport, TestReport, ToolError, Workspace};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the swarm core
    pub use crate::{
        AgentRole, BatchRunner, Disposition, InferenceClient, InferenceError, InferenceRequest,
        Orchestrator, PipelineReport, PipelineState, StageContext, SwarmConfig, SwarmError,
        Workspace,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
