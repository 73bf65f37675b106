//! # mcp-condenser
//!
//! Condensation engine for MCP tool responses: parse a payload
//! (JSON / YAML / CSV / TSV / XML), preprocess tabular data with semantic
//! heuristics, and serialize the result as compact TOON text, typically
//! shrinking the token count by 55–85% while keeping the facts an LLM
//! needs to answer questions.
//!
//! The pipeline is deliberately lossy: constant columns collapse into
//! header annotations, all-zero and all-null columns disappear, clustered
//! timestamps reduce to one representative, sibling columns fuse into
//! tuples, and nested object arrays lift out as back-referenced
//! sub-tables. The [`shaper`] wraps the pipeline with policy: per-tool
//! routing, a minimum-size gate, revert-if-larger, and hard token caps.
//!
//! ```no_run
//! use mcp_condenser::{condense_text, ShaperConfig};
//!
//! let response = br#"{"items": [{"name": "web-1", "phase": "Running"},
//!                               {"name": "web-2", "phase": "Running"}]}"#;
//! let text = condense_text(response, "list_pods", &ShaperConfig::default());
//! ```

// Allow dead code for library exports not yet used by the binary.
#![allow(dead_code)]

pub mod cli;
pub mod condense;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod parser;
pub mod shaper;
pub mod stats;
pub mod tokens;
pub mod value;

use std::sync::Once;

pub use condense::{condense_value, encode_toon, Heuristics, HeuristicsOverride, Profile};
pub use error::{CondenseError, CondenseResult, ParseError};
pub use metrics::{CondenseMetrics, CounterMetrics, NoopMetrics};
pub use parser::parse_input;
pub use shaper::{condense_text, Shaper, ShaperConfig, ToolMatch};
pub use stats::CondenseStats;
pub use tokens::{BpeCounter, CharEstimator, TokenCounter};
pub use value::Value;

/// Former name of [`condense_value`].
#[deprecated(since = "0.1.0", note = "renamed to condense_value")]
pub fn condense_json(tree: &Value, heuristics: &Heuristics) -> String {
    static WARNED: Once = Once::new();
    WARNED.call_once(|| {
        tracing::warn!("condense_json is deprecated; use condense_value");
    });
    condense_value(tree, heuristics)
}

/// Former name of [`encode_toon`].
#[deprecated(since = "0.1.0", note = "renamed to encode_toon")]
pub fn toon_encode_json(tree: &Value) -> String {
    static WARNED: Once = Once::new();
    WARNED.call_once(|| {
        tracing::warn!("toon_encode_json is deprecated; use encode_toon");
    });
    encode_toon(tree)
}
