//! JUDGE schema parser

use super::extract::JsonDocument;
use super::fields::Fields;
use super::{ParseContext, ResponseParser};
use crate::error::SchemaError;
use crate::model::SecurityAssessment;
use crate::schema::{JudgeResponse, OracleNextAction, SchemaTag, Verdict};

/// JUDGE parser
///
/// `verdict` must be PASS, FAIL or RETRY and `next_action` STOP, RE_AUDIT or
/// TRY_NEXT_ISSUE. `feedback` and `security_assessment` are optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct JudgeParser;

impl ResponseParser for JudgeParser {
    type Output = JudgeResponse;

    const TAG: SchemaTag = SchemaTag::Judge;

    fn decode(
        &self,
        document: &JsonDocument,
        _ctx: &ParseContext<'_>,
    ) -> Result<JudgeResponse, SchemaError> {
        let fields = Fields::new(Self::TAG, &document.object);

        let file_path = fields.required_str("file_path")?;
        let verdict = fields.required_enum::<Verdict>("verdict")?;
        let reasons = fields.string_list("reasons", true)?;
        let next_action = fields.required_enum::<OracleNextAction>("next_action")?;
        let feedback = fields.optional_str("feedback")?;

        let security_assessment = match fields.optional_object("security_assessment")? {
            None => None,
            Some(map) => {
                let nested = fields.nested("security_assessment".to_string(), map);
                Some(SecurityAssessment {
                    critical_issues: nested.optional_count("critical_issues")?,
                    medium_issues: nested.optional_count("medium_issues")?,
                    low_issues: nested.optional_count("low_issues")?,
                    recommendations: nested.string_list("recommendations", false)?,
                })
            }
        };

        Ok(JudgeResponse {
            file_path,
            verdict,
            reasons,
            next_action,
            feedback,
            security_assessment,
        })
    }
}
