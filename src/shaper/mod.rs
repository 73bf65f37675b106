//! Response shaping policy.
//!
//! Wraps the pipeline with the per-tool decisions: which encoding path a
//! tool takes, the minimum-size gate, revert-if-larger, and hard token
//! caps enforced by binary-search truncation. The shaper never fails a
//! response; the worst case is the original text passed through.

pub mod config;

use std::sync::Once;

use tracing::{info, warn};

use crate::condense::{condense_value, encode_toon};
use crate::metrics::{CondenseMetrics, NoopMetrics};
use crate::parser::parse_input;
use crate::tokens::{BpeCounter, TokenCounter};

pub use config::{ShaperConfig, ToolMatch};

/// Encoding path chosen for a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    ToonOnly,
    Condense,
    Fallback,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::ToonOnly => "toon_only",
            Mode::Condense => "condense",
            Mode::Fallback => "toon_fallback",
        }
    }
}

/// The shaping engine: configuration plus injected collaborators.
pub struct Shaper {
    config: ShaperConfig,
    counter: Box<dyn TokenCounter>,
    metrics: Box<dyn CondenseMetrics>,
}

impl Shaper {
    pub fn new(config: ShaperConfig) -> Self {
        Self {
            config,
            counter: Box::new(BpeCounter),
            metrics: Box::new(NoopMetrics),
        }
    }

    pub fn with_counter(mut self, counter: Box<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_metrics(mut self, metrics: Box<dyn CondenseMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Shape one tool response. Unparseable payloads and gated responses
    /// come back unchanged.
    pub fn condense(&self, raw: &str, tool: &str) -> String {
        let mode = if self.config.toon_only_tools.iter().any(|t| t == tool) {
            Mode::ToonOnly
        } else if self.config.condense_tools.matches(tool) {
            Mode::Condense
        } else if self.config.toon_fallback {
            Mode::Fallback
        } else {
            self.metrics.record_request(tool, "passthrough");
            return raw.to_string();
        };

        let (tree, input_format) = match parse_input(raw, self.config.effective_hint(tool)) {
            Ok(parsed) => parsed,
            Err(_) => {
                self.metrics.record_parse_failure(tool);
                self.metrics.record_request(tool, "passthrough");
                return raw.to_string();
            }
        };

        let original_tokens = self.count(raw);
        if self.config.min_token_threshold > 0 {
            if let Some(tokens) = original_tokens {
                if tokens < self.config.min_token_threshold {
                    info!(
                        tool,
                        tokens,
                        threshold = self.config.min_token_threshold,
                        "skipped below threshold"
                    );
                    self.metrics.record_request(tool, "skipped");
                    return raw.to_string();
                }
            }
        }

        let condensed = match mode {
            Mode::Condense => {
                condense_value(&tree, &self.config.effective_heuristics(tool))
            }
            Mode::ToonOnly | Mode::Fallback => encode_toon(&tree),
        };
        let condensed_tokens = self.count(&condensed);

        if self.config.revert_if_larger {
            if let (Some(orig), Some(cond)) = (original_tokens, condensed_tokens) {
                if cond >= orig {
                    info!(
                        tool,
                        mode = mode.as_str(),
                        condensed_tokens = cond,
                        original_tokens = orig,
                        "reverted to original"
                    );
                    self.metrics.record_request(tool, "reverted");
                    return raw.to_string();
                }
            }
        }

        self.metrics.record_request(tool, mode.as_str());
        if let (Some(orig), Some(cond)) = (original_tokens, condensed_tokens) {
            self.metrics.record_tokens(tool, orig, cond);
            let reduction_pct = if orig > 0 {
                (1.0 - cond as f64 / orig as f64) * 100.0
            } else {
                0.0
            };
            info!(
                tool,
                mode = mode.as_str(),
                format = input_format,
                input_tokens = orig,
                output_tokens = cond,
                reduction_pct,
                "condensed"
            );
        }

        let limit = self.config.effective_limit(tool);
        if limit > 0 {
            if let Some(cond) = condensed_tokens {
                if cond > limit {
                    let truncated =
                        truncate_to_token_limit(&condensed, limit, self.counter.as_ref());
                    self.metrics.record_truncation(tool);
                    info!(tool, token_limit = limit, "truncated");
                    return truncated;
                }
            }
        }
        condensed
    }

    /// Count tokens, degrading gracefully when the counter cannot
    /// initialize: gates and caps are bypassed with a one-time warning.
    fn count(&self, text: &str) -> Option<usize> {
        match self.counter.try_count(text) {
            Ok(n) => Some(n),
            Err(e) => {
                static WARNED: Once = Once::new();
                WARNED.call_once(|| {
                    warn!(
                        error = %e,
                        "token counter unavailable; caps and thresholds disabled"
                    );
                });
                None
            }
        }
    }

}

/// Truncate `text` to fit a token cap, appending a human-readable notice.
///
/// Binary-searches the longest character-aligned prefix whose token count
/// fits the cap minus the notice. Returns the text unchanged when it
/// already fits or the counter is unavailable.
pub fn truncate_to_token_limit(text: &str, limit: usize, counter: &dyn TokenCounter) -> String {
    if limit == 0 {
        return text.to_string();
    }
    let Ok(total) = counter.try_count(text) else {
        return text.to_string();
    };
    if total <= limit {
        return text.to_string();
    }

    let over = total - limit;
    let mut notice = format!("\n…[truncated: {over} tokens over limit]");
    let mut notice_tokens = counter.try_count(&notice).unwrap_or(0);
    if notice_tokens >= limit {
        // The full notice alone would blow a tiny cap; keep the bare marker.
        notice = "…".to_string();
        notice_tokens = counter.try_count(&notice).unwrap_or(0);
    }
    let target = limit.saturating_sub(notice_tokens).max(1);

    // Prefix boundaries in char space so no cut splits a code point.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let mut lo = 0usize;
    let mut hi = offsets.len() - 1;
    while lo < hi {
        let mid = (lo + hi + 1) / 2;
        let tokens = counter.try_count(&text[..offsets[mid]]).unwrap_or(0);
        if tokens <= target {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    // Counting prefix and notice separately can undershoot by a token on
    // the joined text; step back until the whole output fits.
    let mut result = format!("{}{notice}", &text[..offsets[lo]]);
    while lo > 0 && counter.try_count(&result).unwrap_or(0) > limit {
        lo -= 1;
        result = format!("{}{notice}", &text[..offsets[lo]]);
    }
    result
}

/// Run the shaper on a raw tool response with the default token counter
/// and no metrics. Invalid UTF-8 passes through lossily re-encoded.
pub fn condense_text(raw: &[u8], tool: &str, config: &ShaperConfig) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => Shaper::new(config.clone()).condense(text, tool),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::CharEstimator;

    fn shaper(config: ShaperConfig) -> Shaper {
        Shaper::new(config).with_counter(Box::new(CharEstimator))
    }

    #[test]
    fn test_unparseable_passes_through() {
        let s = shaper(ShaperConfig::default());
        let raw = "an error occurred while listing pods";
        assert_eq!(s.condense(raw, "list_pods"), raw);
    }

    #[test]
    fn test_threshold_gate_returns_original() {
        let mut config = ShaperConfig::default();
        config.min_token_threshold = 1000;
        let s = shaper(config);
        let raw = r#"{"a": 1, "b": 2}"#;
        assert_eq!(s.condense(raw, "t"), raw);
    }

    #[test]
    fn test_toon_only_skips_preprocessing() {
        let mut config = ShaperConfig::default();
        config.toon_only_tools = vec!["raw_tool".into()];
        let s = shaper(config);
        let raw = r#"{"items": [{"a": "x", "b": 1}, {"a": "x", "b": 2}]}"#;
        let out = s.condense(raw, "raw_tool");
        // Constant column must survive: no annotation bracket on the header.
        assert!(out.contains("a|b"));
        assert!(!out.contains("a=x"));
    }

    #[test]
    fn test_no_match_no_fallback_passthrough() {
        let mut config = ShaperConfig::default();
        config.condense_tools = ToolMatch::List(vec!["only_this".into()]);
        config.toon_fallback = false;
        let s = shaper(config);
        let raw = r#"{"a": 1, "b": 2}"#;
        assert_eq!(s.condense(raw, "other"), raw);
    }

    #[test]
    fn test_revert_if_larger() {
        let mut config = ShaperConfig::default();
        config.revert_if_larger = true;
        let s = shaper(config);
        // Tiny object: TOON output is not smaller, so the original wins.
        let raw = r#"{"a":1,"b":2}"#;
        let out = s.condense(raw, "t");
        let counter = CharEstimator;
        assert!(counter.try_count(&out).unwrap() <= counter.try_count(raw).unwrap());
    }

    #[test]
    fn test_cap_truncates_with_notice() {
        let mut config = ShaperConfig::default();
        config.max_token_limit = 30;
        let s = shaper(config);
        let rows: Vec<String> = (0..60)
            .map(|i| format!("{{\"name\": \"pod-{i}\", \"phase\": \"Phase{i}\"}}"))
            .collect();
        let raw = format!("{{\"items\": [{}]}}", rows.join(","));
        let out = s.condense(&raw, "t");
        assert!(out.contains("…[truncated:"));
        assert!(out.ends_with("tokens over limit]"));
        assert!(CharEstimator.try_count(&out).unwrap() <= 30);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let mut config = ShaperConfig::default();
        config.max_token_limit = 20;
        let s = shaper(config);
        let rows: Vec<String> = (0..40)
            .map(|i| format!("{{\"name\": \"ポッド-{i}\", \"phase\": \"実行中です-{i}\"}}"))
            .collect();
        let raw = format!("{{\"items\": [{}]}}", rows.join(","));
        // Must not panic slicing mid-code-point, and must stay valid UTF-8.
        let out = s.condense(&raw, "t");
        assert!(out.contains("…[truncated:"));
    }

    #[test]
    fn test_condense_text_invalid_utf8() {
        let bytes = [0xff, 0xfe, b'h', b'i'];
        let out = condense_text(&bytes, "t", &ShaperConfig::default());
        assert!(out.contains("hi"));
    }
}
