//! Response parsers for the three oracle schemas
//!
//! Provides decoding from untrusted oracle text into typed responses:
//! - AUDIT → [`AuditResponse`](crate::schema::AuditResponse) (grounded)
//! - FIX → [`FixResponse`](crate::schema::FixResponse)
//! - JUDGE → [`JudgeResponse`](crate::schema::JudgeResponse)
//!
//! [`parse_response`] never panics: every failure is a [`ContractError`]
//! carrying the raw text.

use crate::error::{ContractError, ParseError, SchemaError};
use crate::schema::SchemaTag;

mod audit;
mod extract;
mod fields;
mod fix;
mod judge;

pub use audit::AuditParser;
pub use extract::{locate_object, JsonDocument};
pub use fix::FixParser;
pub use judge::JudgeParser;

/// Ground truth a response is checked against
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseContext<'a> {
    /// File content the oracle was shown
    pub source: &'a str,
    /// Static-analysis text the oracle was shown
    pub tool_output: &'a str,
}

impl<'a> ParseContext<'a> {
    /// Context with source only
    #[inline]
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tool_output: "",
        }
    }

    /// With tool output
    #[inline]
    #[must_use]
    pub fn with_tool_output(mut self, tool_output: &'a str) -> Self {
        self.tool_output = tool_output;
        self
    }

    /// Number of lines in the source
    #[inline]
    #[must_use]
    pub fn lines_count(&self) -> usize {
        self.source.lines().count()
    }
}

/// Parser trait for one response schema
///
/// Implement this trait to add a new oracle contract.
pub trait ResponseParser: Send + Sync {
    /// Typed response this parser produces
    type Output;

    /// Schema this parser enforces
    const TAG: SchemaTag;

    /// Locate the JSON document in raw text
    ///
    /// # Errors
    /// `ParseError` when no decodable object exists.
    fn locate(&self, raw: &str) -> Result<JsonDocument, ParseError> {
        locate_object(raw)
    }

    /// Validate and convert a located document
    ///
    /// # Errors
    /// `SchemaError` on missing keys, wrong types or out-of-vocabulary enums.
    fn decode(
        &self,
        document: &JsonDocument,
        ctx: &ParseContext<'_>,
    ) -> Result<Self::Output, SchemaError>;
}

/// Decode oracle text against a parser's schema
///
/// # Errors
/// `ContractError::Parse` for undecodable text, `ContractError::Schema` for
/// decodable text that violates the schema. Both keep `raw`.
pub fn parse_response<P: ResponseParser>(
    parser: &P,
    raw: &str,
    ctx: &ParseContext<'_>,
) -> Result<P::Output, ContractError> {
    let document = parser.locate(raw).map_err(|source| {
        tracing::warn!(schema = %P::TAG, error = %source, "oracle response not decodable");
        ContractError::Parse {
            schema: P::TAG,
            source,
            raw: raw.to_string(),
        }
    })?;

    parser.decode(&document, ctx).map_err(|source| {
        tracing::warn!(schema = %P::TAG, error = %source, "oracle response violates schema");
        ContractError::Schema {
            source,
            raw: raw.to_string(),
        }
    })
}
