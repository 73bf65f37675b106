//! Strict JSON parsing.

use crate::error::{ParseError, ParseResult};
use crate::value::Value;

/// Parse strict JSON. Bare scalars (a lone number, string, boolean, or
/// null) are rejected so that such inputs fall through to the YAML parser
/// and ultimately fail auto-detection.
pub fn try_parse(text: &str) -> ParseResult<Value> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ParseError::new("json", e.to_string()))?;
    match &json {
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => Ok(Value::from_json(json)),
        _ => Err(ParseError::new("json", "bare scalar is not a document")),
    }
}
