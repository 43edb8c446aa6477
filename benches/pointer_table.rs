//! Benchmarks for the pointer table against std's HashMap.
//!
//! Run with: cargo bench --bench pointer_table

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use llmtrack::{PointerTable, SystemBacking, TableConfig};
use std::collections::HashMap;
use std::sync::Arc;

const KEYS: usize = 10_000;

fn bench_insert_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_remove_10k");

    group.bench_function("pointer_table", |b| {
        let mut table: PointerTable<u64> = PointerTable::new(Arc::new(SystemBacking), TableConfig::default());
        b.iter(|| {
            for i in 1..=KEYS {
                table.add(i * 16, i as u64);
            }
            for i in 1..=KEYS {
                black_box(table.remove(i * 16));
            }
        })
    });

    group.bench_function("std_hashmap", |b| {
        let mut map: HashMap<usize, u64> = HashMap::with_capacity(1024);
        b.iter(|| {
            for i in 1..=KEYS {
                map.insert(i * 16, i as u64);
            }
            for i in 1..=KEYS {
                black_box(map.remove(&(i * 16)));
            }
        })
    });

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut table: PointerTable<u64> = PointerTable::new(Arc::new(SystemBacking), TableConfig::default());
    for i in 1..=KEYS {
        table.add(i * 16, i as u64);
    }

    c.bench_function("lookup_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            i = i % KEYS + 1;
            black_box(table.get_value(i * 16))
        })
    });

    c.bench_function("lookup_miss", |b| {
        let mut i = 0;
        b.iter(|| {
            i = i % KEYS + 1;
            black_box(table.has_key(i * 16 + 8))
        })
    });
}

criterion_group!(benches, bench_insert_remove, bench_lookup);
criterion_main!(benches);
