//! Metrics recording boundary.
//!
//! The engine reports shaping decisions through [`CondenseMetrics`]; the
//! transport decides what to do with them. [`NoopMetrics`] costs nothing
//! when recording is off; [`CounterMetrics`] keeps process-wide totals and
//! backs the test suite.

use std::sync::atomic::{AtomicU64, Ordering};

/// Interface shared by all recorders. Implementations must be cheap and
/// must never fail.
pub trait CondenseMetrics: Send + Sync {
    /// One response handled, labeled with the shaping mode:
    /// `condense`, `toon_only`, `toon_fallback`, `passthrough`,
    /// `skipped`, or `reverted`.
    fn record_request(&self, tool: &str, mode: &str);
    /// Token counts before and after condensing.
    fn record_tokens(&self, tool: &str, input_tokens: usize, output_tokens: usize);
    /// A payload no registered parser accepted.
    fn record_parse_failure(&self, tool: &str);
    /// A token-cap truncation event.
    fn record_truncation(&self, tool: &str);
}

/// Recorder that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl CondenseMetrics for NoopMetrics {
    fn record_request(&self, _tool: &str, _mode: &str) {}
    fn record_tokens(&self, _tool: &str, _input_tokens: usize, _output_tokens: usize) {}
    fn record_parse_failure(&self, _tool: &str) {}
    fn record_truncation(&self, _tool: &str) {}
}

/// Process-wide atomic totals, aggregated across tools.
#[derive(Debug, Default)]
pub struct CounterMetrics {
    pub condensed: AtomicU64,
    pub toon_only: AtomicU64,
    pub toon_fallback: AtomicU64,
    pub passthrough: AtomicU64,
    pub skipped: AtomicU64,
    pub reverted: AtomicU64,
    pub parse_failures: AtomicU64,
    pub truncations: AtomicU64,
    pub input_tokens: AtomicU64,
    pub output_tokens: AtomicU64,
}

impl CounterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens saved so far (never negative).
    pub fn saved_tokens(&self) -> u64 {
        let input = self.input_tokens.load(Ordering::Relaxed);
        let output = self.output_tokens.load(Ordering::Relaxed);
        input.saturating_sub(output)
    }
}

impl CondenseMetrics for CounterMetrics {
    fn record_request(&self, _tool: &str, mode: &str) {
        let counter = match mode {
            "condense" => &self.condensed,
            "toon_only" => &self.toon_only,
            "toon_fallback" => &self.toon_fallback,
            "skipped" => &self.skipped,
            "reverted" => &self.reverted,
            _ => &self.passthrough,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_tokens(&self, _tool: &str, input_tokens: usize, output_tokens: usize) {
        self.input_tokens
            .fetch_add(input_tokens as u64, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(output_tokens as u64, Ordering::Relaxed);
    }

    fn record_parse_failure(&self, _tool: &str) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_truncation(&self, _tool: &str) {
        self.truncations.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_metrics_modes() {
        let m = CounterMetrics::new();
        m.record_request("a", "condense");
        m.record_request("b", "condense");
        m.record_request("c", "reverted");
        m.record_request("d", "passthrough");
        assert_eq!(m.condensed.load(Ordering::Relaxed), 2);
        assert_eq!(m.reverted.load(Ordering::Relaxed), 1);
        assert_eq!(m.passthrough.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_saved_tokens_never_negative() {
        let m = CounterMetrics::new();
        m.record_tokens("t", 100, 40);
        assert_eq!(m.saved_tokens(), 60);
        m.record_tokens("t", 10, 200);
        assert_eq!(m.saved_tokens(), 0);
    }
}
