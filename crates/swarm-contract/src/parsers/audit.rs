//! AUDIT schema parser
//!
//! Required: `file_path`, `summary`, `issues[]`, `needs_context`. Each issue
//! needs `id`, `severity`, `type` and `message`; `line`, `evidence` and
//! `suggested_fix` may be absent. Issues that fail grounding are dropped,
//! never fabricated.

use super::extract::JsonDocument;
use super::fields::Fields;
use super::{ParseContext, ResponseParser};
use crate::error::SchemaError;
use crate::grounding::{GroundingFilter, GroundingWarning, WarningKind};
use crate::schema::{AuditResponse, Issue, IssueType, SchemaTag, Severity};

/// AUDIT parser
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditParser;

impl AuditParser {
    fn decode_issue(
        fields: &Fields<'_>,
        ctx: &ParseContext<'_>,
        warnings: &mut Vec<GroundingWarning>,
    ) -> Result<Issue, SchemaError> {
        let id = fields.required_str("id")?;
        let severity = fields.required_enum::<Severity>("severity")?;
        let issue_type = fields.required_enum::<IssueType>("type")?;
        let message = fields.required_str("message")?;
        let evidence = fields.optional_str("evidence")?.unwrap_or_default();
        let suggested_fix = fields.optional_str("suggested_fix")?.unwrap_or_default();

        let lines_count = ctx.lines_count();
        let line = match fields.optional_int("line")? {
            None => None,
            Some(n) => {
                let in_range = u32::try_from(n)
                    .ok()
                    .filter(|l| *l >= 1 && (*l as usize) <= lines_count);
                if in_range.is_none() {
                    warnings.push(GroundingWarning {
                        issue_id: id.clone(),
                        kind: WarningKind::LineOutOfRange {
                            line: n,
                            lines_count,
                        },
                    });
                }
                in_range
            }
        };

        Ok(Issue {
            id,
            severity,
            issue_type,
            line,
            message,
            evidence,
            suggested_fix,
        })
    }
}

impl ResponseParser for AuditParser {
    type Output = AuditResponse;

    const TAG: SchemaTag = SchemaTag::Audit;

    fn decode(
        &self,
        document: &JsonDocument,
        ctx: &ParseContext<'_>,
    ) -> Result<AuditResponse, SchemaError> {
        let fields = Fields::new(Self::TAG, &document.object);

        let file_path = fields.required_str("file_path")?;
        let summary = fields.required_str("summary")?;
        let needs_context = fields.required_bool("needs_context")?;
        let items = fields.required_array("issues")?;

        let mut warnings = Vec::new();
        let mut issues = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let path = format!("issues[{i}]");
            let object = item
                .as_object()
                .ok_or_else(|| SchemaError::wrong_type(Self::TAG, path.clone(), "an object"))?;
            let issue_fields = fields.nested(path, object);
            issues.push(Self::decode_issue(&issue_fields, ctx, &mut warnings)?);
        }

        let (issues, dropped) = GroundingFilter::new(ctx.source, ctx.tool_output).filter(issues);
        warnings.extend(dropped);

        Ok(AuditResponse {
            file_path,
            summary,
            issues,
            needs_context,
            warnings,
        })
    }
}
