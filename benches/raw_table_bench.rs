// Structural engine only: hashes are precomputed so key hashing is excluded.
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use hybrid_table::{hash_integer, Key, RawTable};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn sparse_keys(seed: u64, n: usize) -> Vec<(Key, u64)> {
    lcg(seed)
        .take(n)
        .map(|x| {
            let k = (x >> 1) as i64;
            (Key::Integer(k), hash_integer(k))
        })
        .collect()
}

fn bench_sparse_insert_100k(c: &mut Criterion) {
    c.bench_function("raw::sparse_insert_100k", |b| {
        let keys = sparse_keys(1, 100_000);
        b.iter_batched(
            || (RawTable::<u64>::default(), keys.clone()),
            |(mut t, keys)| {
                for (i, (k, h)) in keys.into_iter().enumerate() {
                    t.insert(k, i as u64, h);
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_sparse_erase_half(c: &mut Criterion) {
    c.bench_function("raw::sparse_erase_50k_of_100k", |b| {
        let keys = sparse_keys(3, 100_000);
        b.iter_batched(
            || {
                let mut t = RawTable::<u64>::default();
                for (i, (k, h)) in keys.iter().enumerate() {
                    t.insert(k.clone(), i as u64, *h);
                }
                t
            },
            |mut t| {
                for (k, h) in keys.iter().step_by(2) {
                    t.erase(k, *h);
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(30)
        .measurement_time(Duration::from_secs(6))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_sparse_insert_100k, bench_sparse_erase_half
}
criterion_main!(benches);
