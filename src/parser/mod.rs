//! Ordered parser registry with format auto-detection.
//!
//! Parsing is attempted in priority order JSON → YAML → CSV → TSV → XML;
//! the first parser that succeeds wins. A format hint moves the hinted
//! parser to the front of the scan; unknown hints fall back to plain
//! auto-detection. Bare scalars are rejected by every parser so that a
//! stray number or sentence never masquerades as structured data.

pub mod csv;
pub mod json;
pub mod xml;
pub mod yaml;

use crate::error::{ParseError, ParseResult};
use crate::value::Value;

/// A pluggable input parser. The registry is an explicit ordered list so
/// the auto-detect order stays obvious.
pub struct Parser {
    pub name: &'static str,
    pub try_parse: fn(&str) -> ParseResult<Value>,
    pub priority: u8,
}

/// The built-in registry, already sorted by ascending priority.
pub const REGISTRY: &[Parser] = &[
    Parser {
        name: "json",
        try_parse: json::try_parse,
        priority: 10,
    },
    Parser {
        name: "yaml",
        try_parse: yaml::try_parse,
        priority: 20,
    },
    Parser {
        name: "csv",
        try_parse: csv::try_parse,
        priority: 30,
    },
    Parser {
        name: "tsv",
        try_parse: csv::try_parse_tsv,
        priority: 31,
    },
    Parser {
        name: "xml",
        try_parse: xml::try_parse,
        priority: 40,
    },
];

/// Parse `text` using the first matching parser in the registry.
///
/// Returns the decoded tree together with the name of the parser that
/// accepted it. When a `format_hint` is given the hinted parser is tried
/// first; if it rejects the input the remaining parsers run in registry
/// order.
pub fn parse_input(text: &str, format_hint: Option<&str>) -> ParseResult<(Value, &'static str)> {
    if let Some(hint) = format_hint {
        if let Some(parser) = REGISTRY.iter().find(|p| p.name == hint) {
            if let Ok(value) = (parser.try_parse)(text) {
                return Ok((value, parser.name));
            }
        }
    }

    for parser in REGISTRY {
        if Some(parser.name) == format_hint {
            continue; // hinted parser already failed above
        }
        if let Ok(value) = (parser.try_parse)(text) {
            return Ok((value, parser.name));
        }
    }

    let names: Vec<&str> = REGISTRY.iter().map(|p| p.name).collect();
    Err(ParseError::new(
        "auto",
        format!("no registered parser accepted the input ({})", names.join(", ")),
    ))
}
