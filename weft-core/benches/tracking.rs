//! Benchmarks for the hot paths: tracked reads and triggering writes.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use weft_core::{effect, reactive, ref_, Key, Target};

fn tracked_read(c: &mut Criterion) {
    let state = reactive(&Target::from_json(json!({"a": 1, "b": 2})).unwrap_or_else(Target::record));

    c.bench_function("untracked handle get", |b| {
        b.iter(|| black_box(state.get("a")));
    });

    c.bench_function("effect reading two keys", |b| {
        b.iter(|| {
            let view = state.clone();
            let e = effect(move || {
                black_box(view.get("a"));
                black_box(view.get("b"));
            });
            black_box(e.run_count())
        });
    });
}

fn triggering_write(c: &mut Criterion) {
    let state = reactive(&Target::from_json(json!({"n": 0})).unwrap_or_else(Target::record));
    let view = state.clone();
    let _watcher = effect(move || {
        black_box(view.get("n"));
    });

    let mut n = 0;
    c.bench_function("set with one subscriber", |b| {
        b.iter(|| {
            n += 1;
            state.set("n", n).unwrap_or(false)
        });
    });

    let list = reactive(&Target::from_items(0..64));
    let watchers: Vec<_> = (0..64usize)
        .map(|i| {
            let view = list.clone();
            effect(move || {
                black_box(view.get(i));
            })
        })
        .collect();

    c.bench_function("truncate and regrow 64-element array", |b| {
        b.iter(|| {
            list.set(Key::Length, 0).unwrap_or(false);
            for i in 0..64usize {
                list.set(i, i).unwrap_or(false);
            }
        });
    });
    drop(watchers);

    let counter = ref_(0);
    let reader = counter.clone();
    let _ref_watcher = effect(move || {
        black_box(reader.get());
    });
    let mut m = 0;
    c.bench_function("ref set with one subscriber", |b| {
        b.iter(|| {
            m += 1;
            counter.set(m)
        });
    });
}

criterion_group!(benches, tracked_read, triggering_write);
criterion_main!(benches);
