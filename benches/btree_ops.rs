//! Micro benchmarks for the on-disk B-tree.
#![allow(missing_docs)]

use blocktree::{BTreeIndex, IndexOptions, Value};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use tempfile::TempDir;

const INSERT_COUNT: u64 = 4_096;

struct FreshIndex {
    index: BTreeIndex,
    _dir: TempDir,
}

impl FreshIndex {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let opts = IndexOptions::new().sync_writes(false);
        let index = BTreeIndex::create_with(dir.path().join("bench.idx"), opts).expect("create");
        Self { index, _dir: dir }
    }

    fn populated() -> Self {
        let mut fresh = Self::new();
        fresh.insert_keys((0..INSERT_COUNT).map(scramble));
        fresh
    }

    fn insert_keys(&mut self, keys: impl Iterator<Item = u64>) {
        let value = Value::new(b"bench").expect("value");
        for key in keys {
            self.index.insert(key, value).expect("insert");
        }
    }
}

/// Deterministic permutation of `0..INSERT_COUNT`.
fn scramble(i: u64) -> u64 {
    (i * 2_654_435_761) % INSERT_COUNT
}

fn btree_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree");
    group.sample_size(20);
    group.throughput(Throughput::Elements(INSERT_COUNT));

    group.bench_function("sequential_insert", |b| {
        b.iter_batched(
            FreshIndex::new,
            |mut fresh| {
                fresh.insert_keys(0..INSERT_COUNT);
                black_box(fresh.index.root_block());
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("scrambled_insert", |b| {
        b.iter_batched(
            FreshIndex::new,
            |mut fresh| {
                fresh.insert_keys((0..INSERT_COUNT).map(scramble));
                black_box(fresh.index.root_block());
            },
            BatchSize::SmallInput,
        );
    });

    let mut populated = FreshIndex::populated();
    group.bench_function("point_lookup", |b| {
        b.iter(|| {
            for key in (0..INSERT_COUNT).step_by(7) {
                black_box(populated.index.search(key).expect("search"));
            }
        });
    });

    group.bench_function("full_traverse", |b| {
        b.iter(|| black_box(populated.index.traverse().count()));
    });

    group.finish();
}

criterion_group!(benches, btree_ops);
criterion_main!(benches);
