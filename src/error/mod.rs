//! Error types for parsing, heuristics configuration, and token counting.

use thiserror::Error;

/// A registered parser rejected the input, or every parser in the registry did.
#[derive(Debug, Clone, Error)]
#[error("input is not valid {format}: {message}")]
pub struct ParseError {
    /// Short format identifier (`json`, `yaml`, `csv`, `tsv`, `xml`, or
    /// `auto` when the whole registry was exhausted).
    pub format: &'static str,
    pub message: String,
}

impl ParseError {
    pub fn new(format: &'static str, message: impl Into<String>) -> Self {
        Self {
            format,
            message: message.into(),
        }
    }
}

/// Token counter initialization failure. The shaper reacts by bypassing
/// caps and thresholds rather than failing the response.
#[derive(Debug, Clone, Error)]
#[error("tokenizer initialization failed: {message}")]
pub struct TokenizerError {
    pub message: String,
}

/// Top-level error type for the condensation engine.
///
/// Only the configuration variants (`UnknownHeuristic`, `UnknownProfile`,
/// `InvalidHeuristicValue`) ever propagate to a caller; everything else is
/// recovered locally by the pipeline.
#[derive(Debug, Error)]
pub enum CondenseError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unknown heuristic '{key}'; valid keys are: {valid}")]
    UnknownHeuristic { key: String, valid: String },

    #[error("invalid value '{value}' for heuristic '{key}': {message}")]
    InvalidHeuristicValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("unknown profile '{name}'; valid profiles are: balanced, compact, precise")]
    UnknownProfile { name: String },

    #[error("flattening depth exceeded {depth} levels")]
    ExtractionDepthExceeded { depth: usize },

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),

    #[error("invalid configuration: {message}")]
    Configuration { message: String },
}

/// Result type used throughout the engine.
pub type CondenseResult<T> = Result<T, CondenseError>;

/// Result type for parser implementations.
pub type ParseResult<T> = Result<T, ParseError>;
