//! Swarm Contract - Response Contract Layer
//!
//! The trusted boundary between the untrusted text returned by the inference
//! service and the typed values the orchestrator works with.
//!
//! # Core Operations
//!
//! - **Decode**: strip fences, locate the outermost JSON object, repair and decode it
//! - **Validate**: check required keys and enum membership per [`SchemaTag`]
//! - **Ground**: drop audit issues whose evidence cannot be found in the code or tool output
//! - **Gate**: verify candidate source is syntactically valid before it may be written
//!
//! # Architecture
//!
//! ```text
//! oracle text → extract → repair → serde_json::Value → ResponseParser → typed response
//!                                                            ↓
//!                                                   GroundingFilter (AUDIT only)
//! ```
//!
//! # Example
//!
//! ```rust
//! use swarm_contract::parsers::{parse_response, AuditParser, ParseContext};
//!
//! let code = "def f(x):\n    return 1 / x\n";
//! let raw = r#"```json
//! {"file_path": "f.py", "summary": "one issue", "needs_context": false,
//!  "issues": [{"id": "ISSUE-001", "severity": "HIGH", "type": "RUNTIME", "line": 2,
//!              "message": "division by zero", "evidence": "return 1 / x",
//!              "suggested_fix": "guard x == 0"}]}
//! ```"#;
//!
//! let ctx = ParseContext::new(code);
//! let audit = parse_response(&AuditParser, raw, &ctx).unwrap();
//! assert_eq!(audit.issues.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod grounding;
pub mod model;
pub mod parsers;
pub mod schema;
pub mod syntax;

pub use error::{ContractError, ParseError, SchemaError, SyntaxError};
pub use grounding::{GroundingFilter, GroundingWarning, WarningKind};
pub use model::{
    AuditResult, FixChange, FixReport, FixSummary, QualityMetrics, SecurityAssessment,
    TestResults, ValidationResult,
};
pub use schema::{
    AuditResponse, FixAction, FixResponse, Issue, IssueType, JudgeResponse, NextAction,
    OracleNextAction, SchemaTag, Severity, Verdict, WireEnum, NO_CHANGE,
};
pub use syntax::{Language, SyntaxChecker};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with response contracts
    pub use crate::error::{ContractError, ParseError, SchemaError};
    pub use crate::parsers::{
        parse_response, AuditParser, FixParser, JudgeParser, ParseContext, ResponseParser,
    };
    pub use crate::schema::{Issue, IssueType, SchemaTag, Severity, Verdict};
    pub use crate::syntax::{Language, SyntaxChecker};
}
