use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use wayline::KeyedStore;

const UPSERTS_PER_ITER: usize = 10_000;

fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert");
    for &initial_capacity in &[16_usize, 1024, 16_384] {
        group.bench_with_input(
            BenchmarkId::from_parameter(initial_capacity),
            &initial_capacity,
            |b, &initial_capacity| {
                b.iter_batched(
                    || {
                        let keys: Vec<String> =
                            (0..UPSERTS_PER_ITER).map(|i| format!("device-{i}")).collect();
                        let store: KeyedStore<u64> =
                            KeyedStore::with_capacity(initial_capacity).expect("store");
                        (store, keys)
                    },
                    |(mut store, keys)| {
                        for key in &keys {
                            store.upsert(black_box(key), |v| *v += 1);
                        }
                        black_box(store.len())
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_upsert);
criterion_main!(benches);
