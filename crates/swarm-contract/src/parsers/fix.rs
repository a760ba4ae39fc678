//! FIX schema parser
//!
//! Required: `file_path`, `fixed_issue_id`, `changes_summary`, `updated_code`,
//! `notes`. Oracles often leave `updated_code` empty and append the file as a
//! fenced block after the JSON; that block is accepted in its place.

use super::extract::{strip_code_fence, JsonDocument};
use super::fields::Fields;
use super::{ParseContext, ResponseParser};
use crate::error::SchemaError;
use crate::schema::{FixResponse, SchemaTag};

/// Confidence assumed when the oracle omits it
const DEFAULT_CONFIDENCE: f64 = 1.0;

/// FIX parser
#[derive(Debug, Clone, Copy, Default)]
pub struct FixParser;

impl FixParser {
    /// Resolve the candidate code and whether it came from a trailing block
    fn updated_code(
        fields: &Fields<'_>,
        document: &JsonDocument,
    ) -> Result<(String, bool), SchemaError> {
        let inline = fields.optional_str("updated_code")?;
        match inline {
            Some(code) if !code.trim().is_empty() => Ok((strip_code_fence(&code), false)),
            blank => match document.trailing_source() {
                Some(code) => Ok((code, true)),
                None if blank.is_some() => Ok((String::new(), false)),
                None => Err(SchemaError::missing(Self::TAG, "updated_code")),
            },
        }
    }
}

impl ResponseParser for FixParser {
    type Output = FixResponse;

    const TAG: SchemaTag = SchemaTag::Fix;

    fn decode(
        &self,
        document: &JsonDocument,
        ctx: &ParseContext<'_>,
    ) -> Result<FixResponse, SchemaError> {
        let fields = Fields::new(Self::TAG, &document.object);

        let file_path = fields.required_str("file_path")?;
        let fixed_issue_id = fields.required_str("fixed_issue_id")?;
        let changes_summary = fields.required_str("changes_summary")?;
        let (updated_code, code_from_trailing_block) = Self::updated_code(&fields, document)?;
        let notes = fields.required_str("notes")?;

        let confidence = fields
            .optional_f64("confidence")?
            .filter(|c| !c.is_nan())
            .map_or(DEFAULT_CONFIDENCE, |c| c.clamp(0.0, 1.0));

        let response = FixResponse {
            file_path,
            fixed_issue_id,
            changes_summary,
            updated_code,
            notes,
            confidence,
            code_from_trailing_block,
        };

        if response.is_no_change() && response.updated_code.trim_end() != ctx.source.trim_end() {
            return Err(SchemaError::NoChangeMismatch);
        }

        Ok(response)
    }
}
