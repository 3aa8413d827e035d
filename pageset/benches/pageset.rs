use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::seq::SliceRandom;
use rand::thread_rng;

use pageset::idl::IdlConfig;
use pageset::{Id2l, Idl};

// Utility function for generating shuffled, duplicate free page identifiers
fn shuffled_ids(len: u64) -> Vec<u64> {
    let mut ids: Vec<u64> = (0..len).map(|i| i * 3 + 1).collect();
    ids.shuffle(&mut thread_rng());
    ids
}

fn idl_append_sort(c: &mut Criterion) {
    let config = IdlConfig::new(4_096, 65_535).expect("valid config");

    let mut group = c.benchmark_group("idl");
    for size in [64, 512, 4096, 32_768, 131_072].iter() {
        let ids = shuffled_ids(*size);
        group.bench_with_input(BenchmarkId::new("append and sort", size), &ids, |b, ids| {
            b.iter(|| {
                let mut idl = Idl::with_config(config).expect("allocates");
                for id in ids {
                    idl.append(*id).expect("appends");
                }
                idl.sort();
                black_box(idl)
            })
        });
        group.bench_with_input(BenchmarkId::new("std sort", size), &ids, |b, ids| {
            b.iter(|| {
                let mut v = ids.clone();
                v.sort_unstable_by(|a, b| b.cmp(a));
                black_box(v)
            })
        });
    }
    group.finish();
}

fn id2l_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("id2l");
    for size in [64, 512, 4096, 32_768].iter() {
        let ids = shuffled_ids(*size);
        group.bench_with_input(BenchmarkId::new("insert", size), &ids, |b, ids| {
            b.iter(|| {
                let mut map = Id2l::new();
                for (idx, id) in ids.iter().enumerate() {
                    map.insert(*id, idx).expect("inserts");
                }
                black_box(map)
            })
        });
        let mut map = Id2l::new();
        for (idx, id) in ids.iter().enumerate() {
            map.insert(*id, idx).expect("inserts");
        }
        group.bench_with_input(BenchmarkId::new("lookup", size), &ids, |b, ids| {
            b.iter(|| {
                for id in ids {
                    black_box(map.get(*id));
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, idl_append_sort, id2l_insert);
criterion_main!(benches);
