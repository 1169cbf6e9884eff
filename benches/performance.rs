//! Performance benchmarks for projection and fan-out.

use async_trait::async_trait;
use changecast::{
    project, ChangeRecord, Connection, Dispatcher, FieldSet, Payload, SubscriberRegistry,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Accepts every frame and keeps nothing.
struct DiscardConnection;

#[async_trait]
impl Connection for DiscardConnection {
    async fn send_text(&mut self, payload: &Payload) -> changecast::Result<()> {
        black_box(payload.len());
        Ok(())
    }

    async fn close(&mut self) {}
}

fn document(width: usize) -> Map<String, Value> {
    (0..width)
        .map(|i| (format!("field_{}", i), json!(format!("value {}", i))))
        .collect()
}

/// Benchmark projection with varying document widths
fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");
    let fields = FieldSet::new(["field_0", "field_3", "field_7", "missing"]);

    for width in [4, 16, 64, 256] {
        let record = ChangeRecord::Insert {
            full_document: document(width),
        };
        group.bench_with_input(BenchmarkId::new("width", width), &record, |b, record| {
            b.iter(|| {
                let (event, _) = project(black_box(record), &fields);
                black_box(event.to_payload().unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark decoding raw change documents
fn bench_decode(c: &mut Criterion) {
    let raw = json!({
        "operationType": "update",
        "updateDescription": {
            "updatedFields": {"title": "A", "text": "B", "count": 3},
            "removedFields": []
        }
    });

    c.bench_function("decode_update", |b| {
        b.iter(|| black_box(ChangeRecord::decode(raw.clone()).unwrap()));
    });
}

/// Benchmark one dispatch to a growing number of subscribers
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let runtime = Runtime::new().unwrap();
    let payload = Payload::from(r#"{"title":"A","text":"B"}"#);

    for subscribers in [1, 10, 100, 1000] {
        let registry = Arc::new(SubscriberRegistry::new());
        runtime.block_on(async {
            for _ in 0..subscribers {
                registry.register(DiscardConnection, None).await.unwrap();
            }
        });
        let dispatcher = Dispatcher::new(Arc::clone(&registry), None);

        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| black_box(runtime.block_on(dispatcher.dispatch(&payload))));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_projection, bench_decode, bench_dispatch);
criterion_main!(benches);
