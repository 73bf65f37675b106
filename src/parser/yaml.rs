//! YAML parsing.

use crate::error::{ParseError, ParseResult};
use crate::value::Value;

/// Parse YAML. Only mappings and sequences count as structured data:
/// plain scalars (which YAML happily produces for almost any text) and
/// empty documents are rejected.
pub fn try_parse(text: &str) -> ParseResult<Value> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ParseError::new("yaml", e.to_string()))?;
    match &yaml {
        serde_yaml::Value::Mapping(m) if !m.is_empty() => Ok(Value::from_yaml(yaml)),
        serde_yaml::Value::Sequence(s) if !s.is_empty() => Ok(Value::from_yaml(yaml)),
        serde_yaml::Value::Mapping(_) | serde_yaml::Value::Sequence(_) => {
            Err(ParseError::new("yaml", "empty document"))
        }
        _ => Err(ParseError::new("yaml", "bare scalar is not a document")),
    }
}
