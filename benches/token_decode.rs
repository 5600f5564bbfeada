//! Hot-path benchmarks: bearer decoding and argument validation.
//!
//! Both run on every authenticated request, so their latency is measured
//! with Criterion across representative input sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sandbox_gateway::auth::decode_bearer;
use sandbox_gateway::auth::token::encode_unsigned;
use sandbox_gateway::catalog::InputSchema;
use serde_json::json;

fn bench_decode_bearer(c: &mut Criterion) {
    let scope_counts: &[usize] = &[1, 4, 32];

    let mut group = c.benchmark_group("decode_bearer");
    for &count in scope_counts {
        let scope = (0..count)
            .map(|i| format!("scope-{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let token = encode_unsigned(
            &json!({"typ": "JWT", "alg": "RS256", "kid": "bench"}),
            &json!({"client_id": "bench-client", "scope": scope, "exp": 4_102_444_800i64}),
        );
        group.bench_with_input(BenchmarkId::from_parameter(count), &token, |b, t| {
            b.iter(|| decode_bearer(black_box(t)).unwrap());
        });
    }
    group.finish();
}

fn bench_validate_arguments(c: &mut Criterion) {
    let schema = InputSchema::translate(
        "ghidra_decompile",
        &json!({
            "type": "object",
            "properties": {
                "filepath": {"type": "string"},
                "address": {"type": "string", "pattern": "^0x[0-9a-f]+$"},
                "depth": {"type": "integer", "minimum": 0}
            },
            "required": ["filepath"]
        }),
    )
    .unwrap();
    let valid = json!({"filepath": "/tmp/a.bin", "address": "0x401000", "depth": 3});
    let invalid = json!({"filepath": 1, "address": "main", "depth": -1});

    let mut group = c.benchmark_group("validate_arguments");
    group.bench_function("valid", |b| {
        b.iter(|| schema.validate("ghidra_decompile", black_box(&valid)).is_ok())
    });
    group.bench_function("invalid", |b| {
        b.iter(|| schema.validate("ghidra_decompile", black_box(&invalid)).is_err())
    });
    group.finish();
}

criterion_group!(benches, bench_decode_bearer, bench_validate_arguments);
criterion_main!(benches);
