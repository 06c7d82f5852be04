//! Recover structured records from a loosely formatted model reply.
//!
//! Models are asked for a bare JSON array but routinely wrap it in a
//! ```` ```json ```` fence, add a sentence before it, or return a single
//! object. The rules, in order:
//!
//! 1. trim the reply;
//! 2. take the body of the first fence tagged `json` if there is one,
//!    otherwise the body of the first fence of any kind, otherwise the
//!    whole text;
//! 3. an array is used as-is, an object becomes a one-element array,
//!    anything else fails the document.
//!
//! Every record then gets `source_pdf`, `extracted_at` and `provider`
//! prepended. Extracted fields with the same names overwrite those values.

use crate::error::DocumentError;
use crate::output::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```json[ \t]*\r?\n?(.*?)(?:```|\z)").unwrap());

static RE_ANY_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)(?:```|\z)").unwrap());

/// Provenance stamped onto every record of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Input file name, e.g. `10.1000abc - Title.pdf`.
    pub source: String,
    pub extracted_at: String,
    pub provider: String,
}

impl Provenance {
    fn stamp(&self, fields: serde_json::Map<String, Value>) -> Record {
        let mut record = Record::new();
        record.insert("source_pdf".into(), Value::String(self.source.clone()));
        record.insert(
            "extracted_at".into(),
            Value::String(self.extracted_at.clone()),
        );
        record.insert("provider".into(), Value::String(self.provider.clone()));
        for (key, value) in fields {
            record.insert(key, value);
        }
        record
    }
}

/// Text the JSON parser should see: fence body if any, else the trimmed reply.
pub fn strip_fences(raw: &str) -> &str {
    let text = raw.trim();
    RE_JSON_FENCE
        .captures(text)
        .or_else(|| RE_ANY_FENCE.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(text)
}

/// Parse a reply into provenance-stamped records.
///
/// All-or-nothing: one bad element fails the whole reply.
pub fn parse_response(raw: &str, provenance: &Provenance) -> Result<Vec<Record>, DocumentError> {
    let body = strip_fences(raw);
    if body.is_empty() {
        return Err(DocumentError::EmptyResponse);
    }

    let value: Value = serde_json::from_str(body).map_err(|e| DocumentError::MalformedOutput {
        detail: format!("invalid JSON: {e}"),
    })?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => vec![Value::Object(map)],
        other => {
            return Err(DocumentError::MalformedOutput {
                detail: format!("expected an array or object, got {}", kind(&other)),
            })
        }
    };

    if items.is_empty() {
        return Err(DocumentError::MalformedOutput {
            detail: "reply contained no records".into(),
        });
    }

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(fields) => Ok(provenance.stamp(fields)),
            other => Err(DocumentError::MalformedOutput {
                detail: format!("record {} is {}, not an object", i + 1, kind(&other)),
            }),
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
