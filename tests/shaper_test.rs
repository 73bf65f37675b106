//! Response-shaping policy laws: gating, revert, caps, and overrides.

use std::collections::BTreeMap;

use mcp_condenser::condense::heuristics::{self, HeuristicsOverride, Profile};
use mcp_condenser::shaper::truncate_to_token_limit;
use mcp_condenser::tokens::{CharEstimator, TokenCounter};
use mcp_condenser::{CounterMetrics, Shaper, ShaperConfig, ToolMatch};

use std::sync::atomic::Ordering;
use std::sync::Arc;

fn shaper(config: ShaperConfig) -> Shaper {
    Shaper::new(config).with_counter(Box::new(CharEstimator))
}

fn sample_payload(rows: usize) -> String {
    let items: Vec<String> = (0..rows)
        .map(|i| {
            format!(
                "{{\"name\": \"pod-{i}\", \"namespace\": \"default\", \"phase\": \"Phase-{}\", \"restarts\": 0}}",
                i % 3
            )
        })
        .collect();
    format!("{{\"items\": [{}]}}", items.join(","))
}

#[test]
fn test_monotone_gating_returns_identical_input() {
    // Below the threshold the response comes back byte-identical.
    let raw = sample_payload(2);
    assert!(CharEstimator.try_count(&raw).unwrap() < 1000);

    let mut config = ShaperConfig::default();
    config.min_token_threshold = 1000;
    let out = shaper(config).condense(&raw, "list_pods");
    assert_eq!(out, raw);
}

#[test]
fn test_revert_law_bounds_output() {
    // With revert_if_larger the output never exceeds the original.
    let counter = CharEstimator;
    let mut config = ShaperConfig::default();
    config.revert_if_larger = true;
    let s = shaper(config);

    for raw in [
        sample_payload(1),
        sample_payload(10),
        r#"{"a":1}"#.to_string(),
        r#"{"x": {"y": {"z": "deep"}}}"#.to_string(),
    ] {
        let out = s.condense(&raw, "t");
        assert!(
            counter.try_count(&out).unwrap() <= counter.try_count(&raw).unwrap(),
            "revert law violated for {raw}"
        );
    }
}

#[test]
fn test_cap_law() {
    // Output fits the cap and carries the notice as a suffix.
    let limit = 40;
    let mut config = ShaperConfig::default();
    config.max_token_limit = limit;
    let raw = sample_payload(80);
    let out = shaper(config).condense(&raw, "t");

    assert!(CharEstimator.try_count(&out).unwrap() <= limit);
    assert!(out.ends_with("tokens over limit]"), "{out}");
    assert!(out.contains("\n…[truncated:"));
}

#[test]
fn test_per_tool_limit_wins_over_global() {
    let mut config = ShaperConfig::default();
    config.max_token_limit = 10_000;
    config.tool_token_limits.insert("chatty".into(), 30);
    let raw = sample_payload(80);

    let s = shaper(config);
    let capped = s.condense(&raw, "chatty");
    let uncapped = s.condense(&raw, "other");
    assert!(capped.contains("…[truncated:"));
    assert!(!uncapped.contains("…[truncated:"));
}

#[test]
fn test_profile_override_precedence() {
    // Precedence: profile -> server heuristics -> tool heuristics.
    let mut server = HeuristicsOverride::default();
    server.set("max_tuple_size", "6").unwrap();
    server.set("elide_timestamps", "false").unwrap();
    let mut tool = HeuristicsOverride::default();
    tool.set("max_tuple_size", "2").unwrap();
    tool.set("wide_table_threshold", "25").unwrap();

    let merged = heuristics::resolve(Profile::Compact, &server, Some(&tool));

    let mut expected = Profile::Compact.heuristics();
    expected.max_tuple_size = 2; // tool override wins
    expected.elide_timestamps = false; // server override survives
    expected.wide_table_threshold = 25; // tool override over profile's 20
    assert_eq!(merged, expected);
}

#[test]
fn test_precise_profile_elides_nothing() {
    let mut config = ShaperConfig::default();
    config.profile = Profile::Precise;
    let s = shaper(config);
    // namespace is constant and restarts is all-zero; precise keeps both.
    let out = s.condense(&sample_payload(5), "t");
    let header = out
        .lines()
        .find(|l| l.contains('|'))
        .expect("table header present");
    assert!(header.contains("namespace"), "{out}");
    assert!(header.contains("restarts"), "{out}");
    assert!(!out.contains("mostly-zero"), "{out}");
    assert!(!out.contains("all-zero"), "{out}");
}

#[test]
fn test_config_resolves_tool_heuristics() {
    let mut config = ShaperConfig::default();
    config.profile = Profile::Precise;
    let mut tool_override = HeuristicsOverride::default();
    tool_override.set("elide_constants", "true").unwrap();
    config.tool_heuristics = BTreeMap::from([("special".into(), tool_override)]);

    assert!(!config.effective_heuristics("normal").elide_constants);
    assert!(config.effective_heuristics("special").elide_constants);
}

#[test]
fn test_toon_only_list_bypasses_heuristics() {
    let mut config = ShaperConfig::default();
    config.toon_only_tools = vec!["raw_dump".into()];
    let raw = sample_payload(6);
    let out = shaper(config).condense(&raw, "raw_dump");
    // Constant namespace column survives raw encoding.
    assert!(out.contains("default"));
    assert!(!out.contains("namespace=default"));
}

#[test]
fn test_fallback_disabled_passes_through() {
    let mut config = ShaperConfig::default();
    config.condense_tools = ToolMatch::List(vec!["wanted".into()]);
    config.toon_fallback = false;
    let raw = sample_payload(3);
    let s = shaper(config);
    assert_eq!(s.condense(&raw, "unwanted"), raw);
    assert_ne!(s.condense(&raw, "wanted"), raw);
}

#[test]
fn test_parse_failure_counted_and_passed_through() {
    let metrics = Arc::new(CounterMetrics::new());
    struct SharedMetrics(Arc<CounterMetrics>);
    impl mcp_condenser::CondenseMetrics for SharedMetrics {
        fn record_request(&self, tool: &str, mode: &str) {
            self.0.record_request(tool, mode)
        }
        fn record_tokens(&self, tool: &str, input: usize, output: usize) {
            self.0.record_tokens(tool, input, output)
        }
        fn record_parse_failure(&self, tool: &str) {
            self.0.record_parse_failure(tool)
        }
        fn record_truncation(&self, tool: &str) {
            self.0.record_truncation(tool)
        }
    }

    let s = Shaper::new(ShaperConfig::default())
        .with_counter(Box::new(CharEstimator))
        .with_metrics(Box::new(SharedMetrics(metrics.clone())));

    let raw = "plain text error message";
    assert_eq!(s.condense(raw, "t"), raw);
    assert_eq!(metrics.parse_failures.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.passthrough.load(Ordering::Relaxed), 1);
}

#[test]
fn test_truncation_notice_suffix_and_boundaries() {
    let counter = CharEstimator;
    let text: String = (0..200)
        .map(|i| format!("line-{i} with some padding\n"))
        .collect();
    let out = truncate_to_token_limit(&text, 100, &counter);
    assert!(counter.try_count(&out).unwrap() <= 100);
    assert!(out.ends_with("tokens over limit]"));

    // Multibyte content must never be split mid-character.
    let wide: String = "日本語テキスト ".repeat(300);
    let out = truncate_to_token_limit(&wide, 50, &counter);
    assert!(out.ends_with("tokens over limit]"));
    assert!(counter.try_count(&out).unwrap() <= 50);
}

#[test]
fn test_truncate_noop_within_limit() {
    let counter = CharEstimator;
    let text = "short text";
    assert_eq!(truncate_to_token_limit(text, 1000, &counter), text);
    assert_eq!(truncate_to_token_limit(text, 0, &counter), text);
}

#[test]
fn test_tiny_cap_still_bounds_output() {
    // Caps smaller than the notice itself must still be respected.
    let counter = CharEstimator;
    let text: String = (0..100).map(|i| format!("row-{i} padding padding\n")).collect();
    for limit in [1, 2, 3, 5] {
        let out = truncate_to_token_limit(&text, limit, &counter);
        assert!(
            counter.try_count(&out).unwrap() <= limit,
            "cap {limit} exceeded: {out:?}"
        );
    }
}

#[test]
fn test_condense_text_entry_point() {
    let raw = sample_payload(8);
    let out = mcp_condenser::condense_text(raw.as_bytes(), "list_pods", &ShaperConfig::default());
    assert!(out.contains("# items"));
    assert!(out.contains("namespace=default"));
}
