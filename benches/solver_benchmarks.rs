//! Performance benchmarks for the CFR solver.
//!
//! Run with: cargo bench
//!
//! These benchmarks track tree construction and per-iteration solving speed
//! on the bundled games to detect performance regressions early.

use cfr_solver::games::{Kuhn, LeducNoRaise};
use cfr_solver::{
    CfrSolver, CfrVariant, GameTree, MccfrSolver, SamplingScheme, SolverConfig,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_tree_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build");
    group.bench_function("kuhn", |b| b.iter(|| black_box(GameTree::<Kuhn>::new())));
    group.bench_function("leduc", |b| {
        b.iter(|| black_box(GameTree::<LeducNoRaise>::new()))
    });
    group.finish();
}

fn bench_cfr_iterations(c: &mut Criterion) {
    let tree = GameTree::<LeducNoRaise>::new();
    let iterations = 100u64;

    let mut group = c.benchmark_group("cfr_leduc");
    group.throughput(Throughput::Elements(iterations));
    for (name, variant) in [
        ("vanilla", CfrVariant::Vanilla),
        ("cfr_plus", CfrVariant::CfrPlus),
        ("dcfr", CfrVariant::Discounted(Default::default())),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &variant, |b, &variant| {
            b.iter(|| {
                let config = SolverConfig::default().with_variant(variant).with_threads(1);
                let solver = CfrSolver::new(&tree, config).unwrap();
                black_box(solver.solve(iterations))
            })
        });
    }
    group.finish();
}

fn bench_mccfr_iterations(c: &mut Criterion) {
    let tree = GameTree::<LeducNoRaise>::new();
    let iterations = 10_000u64;

    let mut group = c.benchmark_group("mccfr_leduc");
    group.throughput(Throughput::Elements(iterations));
    for (name, scheme) in [
        ("external", SamplingScheme::External),
        ("outcome", SamplingScheme::Outcome),
        ("chance", SamplingScheme::Chance),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &scheme, |b, &scheme| {
            b.iter(|| {
                let config = SolverConfig::default().with_threads(1).with_seed(1);
                let solver = MccfrSolver::new(&tree, scheme, config).unwrap();
                solver.solve(iterations);
                black_box(solver.iterations())
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_tree_build,
    bench_cfr_iterations,
    bench_mccfr_iterations
);
criterion_main!(benches);
