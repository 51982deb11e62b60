// Change calculation benchmarks
//
// Measures the diff between consecutive versions of a collection and the
// flattening of its index sets, for a few collection sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use notifier_core::changes::{ChangeNotification, ChangeSet, IndexSet};
use notifier_core::store::{Collection, Row};
use notifier_core::test_utils::SnapshotBuilder;
use serde_json::json;

const SIZES: [usize; 3] = [100, 1_000, 10_000];

/// `size` rows starting at key `offset`, every tenth row carrying `generation`
fn collection(size: usize, offset: usize, generation: u64) -> Collection {
    Collection::from_rows(
        (offset..offset + size)
            .map(|i| {
                let value = if i % 10 == 0 { json!({"n": i, "gen": generation}) } else { json!({"n": i}) };
                Row::new(format!("row-{:06}", i), value)
            })
            .collect(),
    )
}

fn bench_changeset_between(c: &mut Criterion) {
    let mut group = c.benchmark_group("changeset_between");

    for size in SIZES {
        let previous = collection(size, 0, 1);
        let current = collection(size, size / 20, 2);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| ChangeSet::between(black_box(Some(&previous)), black_box(Some(&current))));
        });
    }

    group.finish();
}

fn bench_notification_changes(c: &mut Criterion) {
    let mut group = c.benchmark_group("notification_changes");

    for size in SIZES {
        let keys: Vec<String> = (0..size).map(|i| format!("row-{:06}", i)).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();

        let previous = SnapshotBuilder::new("/bench").version(1).rows("items", &refs).build();
        let current = SnapshotBuilder::new("/bench")
            .version(2)
            .rows("items", &refs[size / 2..])
            .rows("others", &refs[..size / 10])
            .build();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let notification =
                    ChangeNotification::new(Some(previous.clone()), current.clone()).unwrap();
                black_box(notification.compute_changes())
            });
        });
    }

    group.finish();
}

fn bench_index_set_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_set_flatten");

    for size in SIZES {
        let contiguous: IndexSet = (0..size).collect();
        let sparse: IndexSet = (0..size).step_by(2).collect();

        group.bench_with_input(BenchmarkId::new("contiguous", size), &contiguous, |b, set| {
            b.iter(|| black_box(set.flatten()));
        });
        group.bench_with_input(BenchmarkId::new("sparse", size), &sparse, |b, set| {
            b.iter(|| black_box(set.flatten()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_changeset_between, bench_notification_changes, bench_index_set_flatten);
criterion_main!(benches);
