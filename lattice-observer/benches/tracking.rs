//! Benchmarks for render-time access tracking.
//!
//! Run with: `cargo bench --package lattice-observer --bench tracking`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use lattice_observer::{observable, use_observable, Host, Object, Value};

/// An observable list of `len` records `{ id, value }`.
fn rows(len: usize) -> Value {
    let rows: Vec<serde_json::Value> = (0..len)
        .map(|i| serde_json::json!({ "id": i, "value": i * 2 }))
        .collect();
    observable(Value::from_json(serde_json::json!({ "rows": rows })))
}

fn sum_rows(store: &Value) -> f64 {
    store
        .get("rows")
        .as_object()
        .map(Object::values)
        .unwrap_or_default()
        .iter()
        .filter_map(|row| row.get("value").as_f64())
        .sum()
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for len in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("tracked_rows", len), &len, |b, &len| {
            let store = rows(len);
            let host = Host::new();
            let root = store.clone();
            let _component = host.mount(move |cx| sum_rows(&use_observable(cx, &root)).to_string());
            let first = store.get("rows").get(0usize);

            let mut n = 0;
            b.iter(|| {
                n += 1;
                let _ = first.as_object().map(|row| row.set("value", n));
                black_box(host.flush())
            });
        });

        group.bench_with_input(BenchmarkId::new("untracked_rows", len), &len, |b, &len| {
            let store = rows(len);
            b.iter(|| black_box(sum_rows(&store)));
        });
    }

    group.finish();
}

fn bench_unrelated_write(c: &mut Criterion) {
    let store = rows(100);
    let host = Host::new();
    let root = store.clone();
    let _component = host.mount(move |cx| use_observable(cx, &root).get("rows").get("length").to_string());
    let object = store.as_object().cloned().unwrap_or_else(Object::record);

    let mut n = 0;
    c.bench_function("unrelated_write", |b| {
        b.iter(|| {
            n += 1;
            let _ = object.set("counter", n);
            black_box(host.flush())
        });
    });
}

criterion_group!(benches, bench_render, bench_unrelated_write);
criterion_main!(benches);
