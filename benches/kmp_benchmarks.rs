use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kmp_genome::modules::seq::random_sequence;
use kmp_genome::{build_lps, dispatch_sequential, kmp_search, Dispatcher, ParallelConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn bench_scan(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let genome = random_sequence(&mut rng, b"ACGT", 1_000_000);
    let pattern = random_sequence(&mut rng, b"ACGT", 12);

    c.bench_function("build_lps_64", |b| {
        let long = random_sequence(&mut StdRng::seed_from_u64(2), b"AC", 64);
        b.iter(|| build_lps(black_box(&long)))
    });

    c.bench_function("kmp_search_1mb", |b| {
        b.iter(|| kmp_search(black_box(&genome), black_box(&pattern)))
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let genome = random_sequence(&mut rng, b"ACGT", 100_000);
    let patterns: Vec<Vec<u8>> = (0..256)
        .map(|_| random_sequence(&mut rng, b"ACGT", 8))
        .collect();

    let mut group = c.benchmark_group("dispatch_256_patterns");
    group.sample_size(10);

    group.bench_function("sequential", |b| {
        b.iter(|| dispatch_sequential(black_box(&genome), black_box(&patterns)))
    });

    for threads in [2, 4, 8] {
        let dispatcher = Dispatcher::new(ParallelConfig::default().with_num_threads(threads)).unwrap();
        group.bench_with_input(BenchmarkId::new("parallel", threads), &threads, |b, _| {
            b.iter(|| dispatcher.dispatch(black_box(&genome), black_box(&patterns)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scan, bench_dispatch);
criterion_main!(benches);
