//! Lifecycle benchmarks: reducer, classifier and store dispatch throughput
//!
//! Run with: `cargo bench --bench lifecycle`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rascl_core::api_reducer::ApiReducer;
use rascl_core::classify::classify;
use rascl_core::endpoint::ApiMap;
use rascl_core::environment::{AlwaysOnline, ApiEnvironment};
use rascl_core::error::CallError;
use rascl_core::reducer::Reducer;
use rascl_runtime::Store;
use serde_json::{json, Value};
use std::time::Duration;

// ============================================================================
// Benchmark Fixtures
// ============================================================================

fn api(endpoints: usize) -> ApiMap {
    (0..endpoints)
        .fold(ApiMap::builder(), |builder, i| {
            builder.endpoint(format!("endpoint{i}"), |_args: Vec<Value>| async { Ok(Value::Null) })
        })
        .build()
        .expect("benchmark API map is valid")
}

// ============================================================================
// Benchmarks
// ============================================================================

/// Request followed by success against a 50-endpoint dispatch table
fn bench_reducer(c: &mut Criterion) {
    let api = api(50);
    let reducer = ApiReducer::new(&api);
    let env = ApiEnvironment::production();
    let actions = api.get("endpoint25").expect("registered").actions();
    let request = actions.request(vec![json!(1), json!("two")]);
    let success = actions.success(json!({"items": [1, 2, 3]}));

    c.bench_function("reducer_request_success", |b| {
        let mut state = api.initial_state();
        b.iter(|| {
            reducer.reduce(&mut state, black_box(&request), &env);
            reducer.reduce(&mut state, black_box(&success), &env);
        });
    });
}

fn bench_classifier(c: &mut Criterion) {
    let errors = [
        CallError::http(500, "Internal Server Error"),
        CallError::http(404, "Not Found"),
        CallError::timeout("deadline exceeded"),
        CallError::network("connection refused"),
        CallError::Unknown,
    ];

    c.bench_function("classify_mixed_errors", |b| {
        b.iter(|| {
            for error in &errors {
                black_box(classify(black_box(error), &AlwaysOnline));
            }
        });
    });
}

/// Send + broadcast of one trigger event with an observer attached
fn bench_store_send(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_send");
    group.measurement_time(Duration::from_secs(10));

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let api = api(10);
    let store = Store::new(&api, ApiEnvironment::production());
    let actions = api.get("endpoint3").expect("registered").actions();

    group.bench_function("request_with_observer", |b| {
        b.to_async(&runtime).iter(|| async {
            let mut rx = store.subscribe_actions();
            store
                .send(black_box(actions.request(vec![])))
                .await
                .expect("send");
            black_box(rx.try_recv().expect("broadcast"));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_reducer, bench_classifier, bench_store_send);
criterion_main!(benches);
