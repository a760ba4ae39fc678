//! Locating and decoding the JSON object inside oracle text
//!
//! Oracles wrap JSON in markdown fences, prepend prose, append a source
//! block, leave trailing commas and put raw newlines inside strings. This
//! module turns such text into a JSON object plus whatever trailed it,
//! without ever panicking.

use crate::error::ParseError;
use serde_json::{Map, Value};

/// Upper bound on balanced candidates tried before giving up
const MAX_CANDIDATES: usize = 8;

/// Located response: the decoded object and the text after it
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument {
    /// Decoded top-level object
    pub object: Map<String, Value>,
    /// Text after the object's closing brace
    pub trailing: String,
}

impl JsonDocument {
    /// Source code carried after the JSON report, if any
    #[must_use]
    pub fn trailing_source(&self) -> Option<String> {
        trailing_source(&self.trailing)
    }
}

/// Strip one enclosing markdown fence (```json … ``` or ``` … ```)
pub(crate) fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```JSON") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        trimmed
    };
    let clean = clean.strip_suffix("```").unwrap_or(clean);
    clean.trim()
}

/// Outcome of scanning for a balanced object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// Byte range of a balanced `{ … }`
    Balanced(usize, usize),
    /// An opening brace at this offset that never closes
    Unclosed(usize),
    /// No opening brace at all
    NoBrace,
}

/// First balanced `{ … }` at or after `from`
///
/// Braces inside string literals do not count.
fn balanced_object(text: &str, from: usize) -> Scan {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    let mut start = None;

    for (offset, c) in text[from..].char_indices() {
        let i = from + offset;
        if escape_next {
            escape_next = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if start.is_some() => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Scan::Balanced(s, i + 1);
                    }
                }
            }
            _ => {}
        }
    }

    start.map_or(Scan::NoBrace, Scan::Unclosed)
}

/// Repair the usual LLM JSON defects
///
/// Outside strings: smart quotes become `"`, trailing commas before `]`/`}`
/// are removed. Inside strings: raw newlines, carriage returns and tabs are
/// escaped and other control characters are dropped.
pub(crate) fn repair_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut smart_string = false;
    let mut escape_next = false;
    let chars: Vec<char> = json.chars().collect();

    for (idx, &c) in chars.iter().enumerate() {
        if in_string {
            if escape_next {
                escape_next = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escape_next = true;
                    out.push(c);
                }
                '"' if !smart_string => {
                    in_string = false;
                    out.push(c);
                }
                '\u{201C}' | '\u{201D}' if smart_string => {
                    in_string = false;
                    smart_string = false;
                    out.push('"');
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => {}
                c => out.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '\u{201C}' | '\u{201D}' => {
                in_string = true;
                smart_string = true;
                out.push('"');
            }
            ',' => {
                let next = chars[idx + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some(']' | '}')) {
                    out.push(c);
                }
            }
            c => out.push(c),
        }
    }

    out
}

fn decode_object(fragment: &str) -> Result<Map<String, Value>, ParseError> {
    let value = match serde_json::from_str::<Value>(fragment) {
        Ok(value) => value,
        Err(strict_err) => serde_json::from_str::<Value>(&repair_json(fragment))
            .map_err(|_| ParseError::invalid_json(&strict_err))?,
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NotAnObject),
    }
}

/// Find and decode the outermost JSON object in oracle text
///
/// # Errors
/// - `ParseError::EmptyResponse` for blank text
/// - `ParseError::NoJsonObject` if no balanced object exists
/// - `ParseError::InvalidJson` if no candidate decodes, even after repair
pub fn locate_object(raw: &str) -> Result<JsonDocument, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let text = strip_markdown_fences(raw);
    let mut from = 0;
    let mut first_error = None;
    let mut candidates = 0;

    while candidates < MAX_CANDIDATES {
        let (start, end) = match balanced_object(text, from) {
            Scan::Balanced(start, end) => (start, end),
            // a stray brace in prose; the object may start after it
            Scan::Unclosed(start) => {
                from = start + 1;
                continue;
            }
            Scan::NoBrace => break,
        };
        candidates += 1;
        match decode_object(&text[start..end]) {
            Ok(object) => {
                return Ok(JsonDocument {
                    object,
                    trailing: text[end..].to_string(),
                });
            }
            Err(err) => {
                first_error.get_or_insert(err);
                from = start + 1;
            }
        }
    }

    Err(first_error.unwrap_or(ParseError::NoJsonObject))
}

/// Body of the first fenced block whose opener carries a language tag
fn tagged_fence_block(text: &str) -> Option<&str> {
    let mut search = 0;
    while let Some(rel) = text[search..].find("```") {
        let open = search + rel;
        let after = &text[open + 3..];
        let line_end = after.find('\n')?;
        let tag = after[..line_end].trim();
        let is_tag = !tag.is_empty()
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_'));
        if is_tag {
            let body = &after[line_end + 1..];
            let end = body.find("```").unwrap_or(body.len());
            return Some(&body[..end]);
        }
        search = open + 3;
    }
    None
}

fn normalize_source(code: &str) -> Option<String> {
    let code = code.trim_start_matches(['\n', '\r']).trim_end();
    if code.is_empty() {
        None
    } else {
        Some(format!("{code}\n"))
    }
}

/// Source text following a JSON report
///
/// Prefers a language-tagged fence; otherwise takes the remaining text with
/// fence lines removed.
pub(crate) fn trailing_source(trailing: &str) -> Option<String> {
    if let Some(block) = tagged_fence_block(trailing) {
        if let Some(code) = normalize_source(block) {
            return Some(code);
        }
    }
    let plain: Vec<&str> = trailing
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect();
    normalize_source(&plain.join("\n"))
}

/// Remove a fence the oracle put around code inside a JSON string
pub(crate) fn strip_code_fence(code: &str) -> String {
    let trimmed = code.trim_start();
    if trimmed.starts_with("```") {
        if let Some(block) = tagged_fence_block(trimmed) {
            return normalize_source(block).unwrap_or_default();
        }
        if let Some(rest) = trimmed.strip_prefix("```\n") {
            let body = rest.find("```").map_or(rest, |end| &rest[..end]);
            return normalize_source(body).unwrap_or_default();
        }
    }
    code.to_string()
}
