//! Metadata + body document format used by feature files.
//!
//! ```text
//! ---
//! phase: planning
//! feature_name: checkout-flow
//! ---
//!
//! # Checkout Flow
//! ```
//!
//! The block between the first two delimiter lines is a YAML mapping; the
//! remainder, trimmed, is the body. A document that does not open with the
//! delimiter is all body with empty metadata.

use crate::error::{FlowError, Result};
use serde_yaml::{Mapping, Value};

pub const DELIMITER: &str = "---";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub metadata: Mapping,
    pub body: String,
}

impl Document {
    pub fn new(metadata: Mapping, body: impl Into<String>) -> Self {
        Self {
            metadata,
            body: body.into(),
        }
    }

    pub fn has_metadata(&self) -> bool {
        !self.metadata.is_empty()
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']) == DELIMITER
}

/// Returns true when `text` opens with a delimiter line.
pub fn starts_with_delimiter(text: &str) -> bool {
    text.split_inclusive('\n').next().is_some_and(is_delimiter)
}

pub fn decode(text: &str) -> Result<Document> {
    if !starts_with_delimiter(text) {
        return Ok(Document::new(Mapping::new(), text));
    }

    let mut lines = text.split_inclusive('\n');
    let opening = lines.next().map(str::len).unwrap_or(0);

    let mut offset = opening;
    let mut closing = None;
    for line in lines {
        if is_delimiter(line) {
            closing = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }
    let Some((meta_end, body_start)) = closing else {
        return Err(FlowError::MalformedFrontmatter(
            "missing closing delimiter".to_string(),
        ));
    };

    let metadata = parse_metadata(&text[opening..meta_end])?;
    let body = text[body_start..].trim().to_string();
    Ok(Document { metadata, body })
}

fn parse_metadata(raw: &str) -> Result<Mapping> {
    if raw.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let value: Value = serde_yaml::from_str(raw)
        .map_err(|e| FlowError::InvalidMetadataSyntax(e.to_string()))?;
    match value {
        Value::Mapping(m) => Ok(m),
        Value::Null => Ok(Mapping::new()),
        other => Err(FlowError::InvalidMetadataSyntax(format!(
            "expected a mapping, found {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Serializes `doc` as `---\n<metadata>---\n\n<body>\n`. Top-level keys with a
/// null value are omitted.
pub fn encode(doc: &Document) -> Result<String> {
    let metadata: Mapping = doc
        .metadata
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut out = String::from(DELIMITER);
    out.push('\n');
    if !metadata.is_empty() {
        out.push_str(&serde_yaml::to_string(&metadata)?);
    }
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    let body = doc.body.trim();
    if !body.is_empty() {
        out.push_str(body);
        out.push('\n');
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
