//! Benchmarks for change notification fan-out and selector recompute.
//!
//! Run with: cargo bench -p rstore-core

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rstore_core::{Repository, Selector};
use std::hint::black_box;

fn bench_set_state_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("repository/set_state");

    for n in [1, 10, 100, 1000] {
        let repo = Repository::new(0u64);
        let subs: Vec<_> = (0..n)
            .map(|_| {
                repo.on_change(|next: &u64, prev: &u64| {
                    black_box(next.wrapping_sub(*prev));
                })
            })
            .collect();
        group.bench_with_input(BenchmarkId::new("listeners", n), &repo, |b, repo| {
            b.iter(|| repo.update(|v| v.wrapping_add(1)))
        });
        drop(subs);
    }

    group.finish();
}

fn bench_selector_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector/recompute");

    for n in [1, 10, 100] {
        let repo = Repository::new(vec![0u64; 64]);
        let selectors: Vec<_> = (0..n)
            .map(|i| {
                let selector = Selector::new(&repo, move |v: &Vec<u64>| v[i % 64] / 8);
                selector
                    .attach(|slice: &u64| {
                        black_box(*slice);
                    })
                    .ok();
                selector
            })
            .collect();
        group.bench_with_input(BenchmarkId::new("attached", n), &repo, |b, repo| {
            b.iter(|| {
                repo.update(|v| {
                    let mut next = v.clone();
                    next[0] = next[0].wrapping_add(1);
                    next
                })
            })
        });
        drop(selectors);
    }

    group.finish();
}

criterion_group!(benches, bench_set_state_fanout, bench_selector_recompute);

criterion_main!(benches);
