//! Generic value tree produced by the parser registry.
//!
//! Every input format decodes into [`Value`] before any preprocessing runs.
//! Objects are insertion-ordered (`IndexMap`); the whole pipeline depends on
//! that ordering for deterministic output, so no variant ever uses an
//! unordered map. Preprocessing builds new trees instead of mutating
//! variants in place.

use indexmap::IndexMap;

/// A decoded tree value. Integers and floats are distinct variants so that
/// `42` and `42.5` survive the trip through preprocessing unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Arr(Vec<Value>),
    /// Key-value pairs in insertion order.
    Obj(IndexMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Scalars are everything that renders into a single table cell.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Arr(_) | Value::Obj(_))
    }

    pub fn as_obj(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Obj(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_arr(&self) -> Option<&[Value]> {
        match self {
            Value::Arr(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Build a [`Value`] from a parsed `serde_json::Value`.
    ///
    /// Relies on the `preserve_order` feature so object keys arrive in
    /// document order.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    // Out of i64 range; keep the magnitude.
                    Value::Float(u as f64)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Arr(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Obj(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Build a [`Value`] from a parsed `serde_yaml::Value`.
    ///
    /// Non-string mapping keys are stringified; tagged values unwrap to
    /// their inner value.
    pub fn from_yaml(yaml: serde_yaml::Value) -> Self {
        match yaml {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_yaml::Value::String(s) => Value::Str(s),
            serde_yaml::Value::Sequence(items) => {
                Value::Arr(items.into_iter().map(Value::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(map) => Value::Obj(
                map.into_iter()
                    .map(|(k, v)| (yaml_key_to_string(&k), Value::from_yaml(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(tagged.value),
        }
    }

    /// Convert back to `serde_json::Value`, used when a sub-tree must be
    /// rendered as raw JSON text (depth overflow, non-tabular cells).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Arr(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Obj(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Compact JSON rendition of an arbitrary sub-tree.
    pub fn to_json_text(&self) -> String {
        serde_json::to_string(&self.to_json()).unwrap_or_else(|_| "null".to_string())
    }
}

fn yaml_key_to_string(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Coerce a trimmed text cell into a typed value: empty becomes null,
/// integer and float literals are promoted, everything else stays a string.
/// Used by the CSV and XML parsers.
pub fn coerce_scalar(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    if looks_like_float(text) {
        if let Ok(f) = text.parse::<f64>() {
            return Value::Float(f);
        }
    }
    Value::Str(text.to_string())
}

/// Like [`coerce_scalar`] but additionally promotes `true`/`false`.
/// XML text content uses this variant.
pub fn coerce_scalar_with_bool(text: &str) -> Value {
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => coerce_scalar(text),
    }
}

// f64::parse accepts "inf", "NaN", and "5." which should stay strings; only
// promote ordinary decimal or exponent literals.
fn looks_like_float(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    if body.is_empty() {
        return false;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot && !seen_exp => seen_dot = true,
            'e' | 'E' if seen_digit && !seen_exp => {
                seen_exp = true;
                if matches!(chars.peek(), Some('+') | Some('-')) {
                    chars.next();
                }
                if chars.peek().is_none() {
                    return false;
                }
            }
            _ => return false,
        }
    }
    seen_digit
        && (seen_dot || seen_exp)
        && body.ends_with(|c: char| c.is_ascii_digit())
}

/// Plain-text rendition of a scalar, used for cells, identity labels, and
/// cardinality analysis. Null renders empty; floats use the shortest
/// round-trip representation.
pub fn format_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => {
            if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Value::Str(s) => s.clone(),
        other => other.to_json_text(),
    }
}
