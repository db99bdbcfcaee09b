//! Criterion benchmarks for grid expansion and sweep planning
//!
//! Run with: cargo bench -p gridsweep_core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gridsweep_core::{
    Axis, CategoryPolicy, ChunkBalancer, Decimal, Grid, SweepPlan, WorkerBudget,
};

/// Ages 6.50..=10.00 in steps of `step` hundredths, with `zs` metallicities
/// and `avs` extinctions
fn create_grid(step: i64, zs: i64, avs: i64) -> Grid {
    let ages = (650..=1000)
        .step_by(step as usize)
        .map(|units| Decimal::new(units, 2));
    let metallicities = (0..zs).map(|i| Decimal::new(-40 + i * 5, 2));
    let extinctions = (0..avs).map(|i| Decimal::new(i, 1));
    Grid::new(vec![
        Axis::new("genlikeliages", ages, 2).unwrap(),
        Axis::new("genlikelizs", metallicities, 2).unwrap(),
        Axis::new("genlikeliavtildes", extinctions, 1).unwrap(),
    ])
    .unwrap()
}

fn bench_combinations(c: &mut Criterion) {
    let mut group = c.benchmark_group("combinations");

    for (step, zs, avs) in [(10, 4, 1), (5, 12, 10), (1, 20, 20)] {
        let grid = create_grid(step, zs, avs);
        group.bench_with_input(
            BenchmarkId::new("expand", grid.len()),
            &grid,
            |b, grid| b.iter(|| black_box(grid).combinations().count()),
        );
    }

    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    let policy = CategoryPolicy::stellar_mass();

    for target in [4, 32, 256] {
        let grid = create_grid(5, 12, 10);
        let balancer = ChunkBalancer::new(WorkerBudget {
            target,
            hard_cap: 10,
        });
        group.bench_with_input(BenchmarkId::new("workers", target), &grid, |b, grid| {
            b.iter(|| SweepPlan::build(black_box(grid), &policy, &balancer).unwrap())
        });
    }

    group.finish();
}

fn bench_over_coverage(c: &mut Criterion) {
    let grid = create_grid(5, 12, 10);
    let plan = SweepPlan::build(
        &grid,
        &CategoryPolicy::stellar_mass(),
        &ChunkBalancer::new(WorkerBudget {
            target: 16,
            hard_cap: 10,
        }),
    )
    .unwrap();

    c.bench_function("over_coverage_all_chunks", |b| {
        b.iter(|| plan.chunks().map(|chunk| chunk.over_coverage()).sum::<usize>())
    });
}

criterion_group!(benches, bench_combinations, bench_plan, bench_over_coverage);
criterion_main!(benches);
