//! Condensation throughput and token-efficiency benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use tiktoken_rs::cl100k_base;

use mcp_condenser::{condense_value, encode_toon, parse_input, Heuristics, Value};

fn count_tokens(text: &str) -> usize {
    let bpe = cl100k_base().unwrap();
    bpe.encode_with_special_tokens(text).len()
}

fn generate_pod_list(count: usize) -> serde_json::Value {
    let pods: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            json!({
                "metadata": {
                    "name": format!("web-{i}"),
                    "namespace": "production",
                    "labels": {"app": "web", "tier": "frontend"}
                },
                "spec": {
                    "node": format!("node-{}", i % 12),
                    "containers": [{
                        "name": "app",
                        "image": "nginx:1.25",
                        "requests": {"cpu": "100m", "memory": "256Mi"}
                    }]
                },
                "status": {
                    "phase": if i % 7 == 0 { "Pending" } else { "Running" },
                    "restarts": 0,
                    "start_time": format!("2024-06-01T12:00:{:02}Z", i % 45)
                }
            })
        })
        .collect();
    json!({ "items": pods })
}

fn bench_condense(c: &mut Criterion) {
    let fixture = generate_pod_list(100);
    let tree = Value::from_json(fixture);
    let heur = Heuristics::default();

    c.bench_function("condense_100_pods", |b| {
        b.iter(|| condense_value(black_box(&tree), black_box(&heur)))
    });

    c.bench_function("raw_encode_100_pods", |b| {
        b.iter(|| encode_toon(black_box(&tree)))
    });
}

fn bench_parse_and_condense(c: &mut Criterion) {
    let raw = serde_json::to_string(&generate_pod_list(100)).unwrap();
    let heur = Heuristics::default();

    c.bench_function("parse_and_condense_100_pods", |b| {
        b.iter(|| {
            let (tree, _) = parse_input(black_box(&raw), None).unwrap();
            condense_value(&tree, &heur)
        })
    });
}

fn report_reduction(c: &mut Criterion) {
    // One-shot reduction report alongside the timing numbers.
    let raw = serde_json::to_string(&generate_pod_list(100)).unwrap();
    let (tree, _) = parse_input(&raw, None).unwrap();
    let condensed = condense_value(&tree, &Heuristics::default());
    let before = count_tokens(&raw);
    let after = count_tokens(&condensed);
    eprintln!(
        "pod-list fixture: {before} -> {after} tokens ({:.1}% reduction)",
        (1.0 - after as f64 / before as f64) * 100.0
    );

    c.bench_function("count_tokens_condensed", |b| {
        b.iter(|| count_tokens(black_box(&condensed)))
    });
}

criterion_group!(
    benches,
    bench_condense,
    bench_parse_and_condense,
    report_reduction
);
criterion_main!(benches);
