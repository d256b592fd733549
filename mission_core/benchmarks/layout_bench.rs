use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mission_core::LayoutGenerator;
use mission_runtime::LayoutParams;

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");

    for chain_length in [4usize, 6, 8, 12] {
        let generator = LayoutGenerator::new(LayoutParams {
            chain_length,
            ..LayoutParams::default()
        })
        .expect("bench parameters are valid");
        group.bench_with_input(
            BenchmarkId::new("chain", chain_length),
            &generator,
            |b, generator| {
                let mut seed = 0u64;
                b.iter(|| {
                    seed = seed.wrapping_add(1);
                    generator.generate(seed)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(layout_benches, bench_layout);
criterion_main!(layout_benches);
