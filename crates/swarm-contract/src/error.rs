//! Error types for the Response Contract layer
//!
//! Provides error handling for:
//! - Decode failures (oracle text → JSON value)
//! - Schema failures (JSON value → typed response)
//! - Syntax failures (candidate source → parse tree)
//!
//! None of these ever panic; a failing response is always returned as a value
//! with the raw oracle text preserved for diagnostics.

use crate::schema::SchemaTag;

/// Oracle text could not be decoded into a JSON object
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Response was empty or whitespace only
    #[error("empty response")]
    EmptyResponse,

    /// No balanced `{ ... }` object was found
    #[error("no JSON object found in response")]
    NoJsonObject,

    /// A candidate object was found but serde_json rejected it
    #[error("invalid JSON at line {line}, column {column}: {message}")]
    InvalidJson {
        message: String,
        line: usize,
        column: usize,
    },

    /// Top-level value decoded but is not an object
    #[error("top-level JSON value is not an object")]
    NotAnObject,
}

impl ParseError {
    /// Build from a serde_json error, keeping its position
    #[must_use]
    pub fn invalid_json(err: &serde_json::Error) -> Self {
        Self::InvalidJson {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
        }
    }
}

/// Decoded JSON does not honor the schema table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A required key is absent (or null)
    #[error("{schema}: missing required field '{field}'")]
    MissingField { schema: SchemaTag, field: String },

    /// A key is present with the wrong JSON type
    #[error("{schema}: field '{field}' must be {expected}")]
    WrongType {
        schema: SchemaTag,
        field: String,
        expected: &'static str,
    },

    /// An enum-valued key holds a value outside its allowed set
    #[error("{schema}: field '{field}' has invalid value '{value}' (allowed: {allowed})")]
    InvalidEnum {
        schema: SchemaTag,
        field: String,
        value: String,
        allowed: String,
    },

    /// `changes_summary` says NO_CHANGE but the code differs from the original
    #[error("FIX: changes_summary is NO_CHANGE but updated_code differs from the original")]
    NoChangeMismatch,
}

impl SchemaError {
    /// Create missing field error
    pub fn missing(schema: SchemaTag, field: impl Into<String>) -> Self {
        Self::MissingField {
            schema,
            field: field.into(),
        }
    }

    /// Create wrong type error
    pub fn wrong_type(schema: SchemaTag, field: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongType {
            schema,
            field: field.into(),
            expected,
        }
    }
}

/// Failure of one oracle response against its contract
///
/// Always carries the raw response so the stage can log it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// No JSON object could be decoded
    #[error("parse error ({schema}): {source}")]
    Parse {
        /// Expected schema
        schema: SchemaTag,
        /// Decoding failure
        #[source]
        source: ParseError,
        /// Oracle text as received
        raw: String,
    },

    /// Decoded, but fields are missing or invalid
    #[error("schema error: {source}")]
    Schema {
        /// Validation failure
        #[source]
        source: SchemaError,
        /// Oracle text as received
        raw: String,
    },
}

impl ContractError {
    /// Raw oracle text that failed the contract
    #[must_use]
    pub fn raw_response(&self) -> &str {
        match self {
            Self::Parse { raw, .. } | Self::Schema { raw, .. } => raw,
        }
    }

    /// True for undecodable text, false for decodable-but-invalid
    #[inline]
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// Candidate source failed the syntax gate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    /// The source does not parse
    #[error("{language} syntax error at line {line}, column {column}: {message}")]
    Invalid {
        language: &'static str,
        line: usize,
        column: usize,
        message: String,
    },

    /// No grammar is available for this file
    #[error("no grammar for file extension: '{0}'")]
    UnsupportedLanguage(String),

    /// Grammar could not be loaded into the parser
    #[error("grammar error: {0}")]
    Grammar(String),
}

/// Result type alias for contract operations
pub type ContractResult<T> = Result<T, ContractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_display() {
        let err = SchemaError::missing(SchemaTag::Audit, "issues");
        assert_eq!(err.to_string(), "AUDIT: missing required field 'issues'");
    }

    #[test]
    fn contract_error_keeps_raw_text() {
        let err = ContractError::Parse {
            schema: SchemaTag::Judge,
            source: ParseError::NoJsonObject,
            raw: "I think it passes".to_string(),
        };
        assert_eq!(err.raw_response(), "I think it passes");
        assert!(err.is_parse_error());
    }

    #[test]
    fn invalid_json_keeps_position() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{\n  \"a\": }").unwrap_err();
        match ParseError::invalid_json(&serde_err) {
            ParseError::InvalidJson { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}
