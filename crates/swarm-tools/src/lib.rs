//! Swarm Tools - concrete collaborators
//!
//! - [`GeminiClient`]: the inference service over the Gemini REST API
//! - [`LocalWorkspace`]: sandboxed files on the local disk, `pylint` for
//!   static analysis and `pytest` for tests

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod gemini;
pub mod local;

pub use gemini::{GeminiClient, GEMINI_BASE_URL};
pub use local::{parse_pylint_json, parse_pytest_summary, LocalWorkspace};
