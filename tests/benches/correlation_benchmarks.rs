//! # Modlib Correlation Benchmarks
//!
//! | Path | Measures |
//! |------|----------|
//! | `PendingCalls` | register + resolve of one continuation |
//! | `PendingCalls` | resolve under N outstanding calls |
//! | `Message` codec | decode of inbound JSON lines |
//! | `ModuleSession` | full mpc round trip over the in-memory channel |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use modlib::{CorrelationId, MemoryTransport, Message, ModuleConfig, ModuleSession, PendingCalls};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// PENDING-CALL REGISTRY
// ============================================================================

fn bench_register_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending-calls");

    group.bench_function("mint_correlation_id", |b| {
        b.iter(|| black_box(CorrelationId::new()))
    });

    let calls: PendingCalls<Value> = PendingCalls::new();
    group.bench_function("register_then_resolve", |b| {
        b.iter(|| {
            let id = CorrelationId::new();
            let mut rx = calls.register(id.clone(), "bench").unwrap();
            calls.resolve(&id, Value::Null);
            black_box(rx.try_recv().is_ok())
        })
    });

    for outstanding in [10usize, 1_000, 10_000] {
        let calls: PendingCalls<Value> = PendingCalls::new();
        let _receivers: Vec<_> = (0..outstanding)
            .map(|_| calls.register(CorrelationId::new(), "idle").unwrap())
            .collect();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("resolve_with_outstanding", outstanding),
            &outstanding,
            |b, _| {
                b.iter(|| {
                    let id = CorrelationId::new();
                    let _rx = calls.register(id.clone(), "bench").unwrap();
                    black_box(calls.resolve(&id, Value::Null))
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// WIRE CODEC
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("message-codec");

    let lines = [
        (
            "mpc_response",
            json!({"type": "mpcResponse", "id": "7f1c", "payload": {"rows": [1, 2, 3]}}).to_string(),
        ),
        (
            "mpc_request",
            json!({"type": "mpcRequest", "id": "7f1c", "payload": {"command": "add", "params": [2, 3]}})
                .to_string(),
        ),
        (
            "invoke",
            json!({"type": "invoke", "handlerId": "users.list", "id": "m1", "payload": null, "query": {"page": 2}})
                .to_string(),
        ),
    ];

    for (name, line) in &lines {
        group.throughput(Throughput::Bytes(line.len() as u64));
        group.bench_with_input(BenchmarkId::new("decode", name), line, |b, line| {
            b.iter(|| black_box(Message::from_json(line).unwrap()))
        });
    }

    group.finish();
}

// ============================================================================
// END-TO-END ROUND TRIP
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let (session, mut host) = runtime.block_on(async {
        let (transport, host) = MemoryTransport::pair();
        let session = ModuleSession::connect(Arc::new(transport), ModuleConfig::default()).unwrap();
        (session, host)
    });

    let mut group = c.benchmark_group("session");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("mpc_round_trip", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let call = session.mpc("echo", "ping", vec![json!(1)]);
                let request = host.recv().await.unwrap();
                let id = request.id().cloned().unwrap();
                host.deliver(Message::MpcResponse { id, payload: json!("pong") })
                    .unwrap();
                black_box(call.await.unwrap())
            })
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_register_resolve,
    bench_decode,
    bench_round_trip
);
criterion_main!(benches);
