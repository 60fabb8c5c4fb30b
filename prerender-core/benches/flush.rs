//! Benchmarks for hydration and list flushes
//!
//! Run with: cargo bench -p prerender-core --bench flush

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};

use prerender_core::prelude::*;

fn markup(items: usize) -> String {
    let live: String = (0..items)
        .map(|i| format!("<li data-init data-bind=\"text: $data\">{i}</li>"))
        .collect();
    format!("<ul id=\"list\">{live}<li data-template data-bind=\"text: $data\"></li></ul>")
}

fn values(items: usize) -> Vec<Value> {
    (0..items).map(|i| json!(i.to_string())).collect()
}

fn bind(doc: &Document, array: &ObservableArray) -> ForeachBinding {
    let host = Host::new(doc.clone(), Arc::new(ImmediateScheduler));
    let list = doc.get_element_by_id("list").expect("list");
    ForeachBinding::bind(&host, list, array.clone(), &BindingContext::root(json!({})))
        .expect("bind")
}

fn bench_hydrate(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrate");

    for items in [10, 100, 1000] {
        group.throughput(Throughput::Elements(items as u64));
        let html = markup(items);
        group.bench_with_input(BenchmarkId::new("bind", items), &items, |b, &items| {
            b.iter(|| {
                let doc = Document::from_html(&html);
                let array = ObservableArray::new(values(items));
                black_box(bind(&doc, &array).len())
            })
        });
    }

    group.finish();
}

fn bench_push_shift(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush/push_shift");

    for items in [10, 100] {
        let doc = Document::from_html(&markup(items));
        let array = ObservableArray::new(values(items));
        let binding = bind(&doc, &array);
        let mut next = items;

        group.bench_function(BenchmarkId::new("rotate", items), |b| {
            b.iter(|| {
                array.push(json!(next.to_string()));
                array.shift();
                next += 1;
            })
        });
        black_box(binding.len());
    }

    group.finish();
}

fn bench_batched_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush/batched");

    for edits in [8, 64] {
        group.throughput(Throughput::Elements(edits as u64));
        group.bench_with_input(BenchmarkId::new("frame", edits), &edits, |b, &edits| {
            b.iter(|| {
                let doc = Document::from_html(&markup(32));
                let array = ObservableArray::new(values(32));
                let scheduler = Arc::new(ManualScheduler::new());
                let host = Host::new(doc.clone(), scheduler.clone());
                let list = doc.get_element_by_id("list").expect("list");
                let binding =
                    ForeachBinding::bind(&host, list, array.clone(), &BindingContext::root(json!({})))
                        .expect("bind");
                for i in 0..edits {
                    array.insert(i % 16, json!(format!("n{i}")));
                }
                scheduler.run_pending();
                black_box(binding.len())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hydrate, bench_push_shift, bench_batched_frame);
criterion_main!(benches);
