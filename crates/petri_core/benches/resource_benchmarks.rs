use criterion::{black_box, criterion_group, criterion_main, Criterion};
use petri_core::resource::ResourceGrid;
use petri_data::{Geometry, ResourceDef};

fn bench_spatial_diffusion(c: &mut Criterion) {
    let defs = vec![
        ResourceDef::spatial("a", Geometry::Torus, 10_000.0, 0.5),
        ResourceDef::spatial("b", Geometry::Grid, 10_000.0, 0.2).with_gravity(0.1, 0.0),
    ];
    let mut grid = ResourceGrid::new(&defs, 100, 100, 1).unwrap();

    c.bench_function("resource_diffusion_100x100_two_resources", |b| {
        b.iter(|| {
            grid.update(1.0);
            black_box(grid.get(0).unwrap())
        })
    });
}

fn bench_lazy_global_reads(c: &mut Criterion) {
    let defs = vec![ResourceDef::global("g", 0.0, 1.0).with_decay(0.01)];
    let mut grid = ResourceGrid::new(&defs, 60, 60, 1).unwrap();

    c.bench_function("resource_global_micro_steps", |b| {
        b.iter(|| {
            for _ in 0..100 {
                grid.update(0.01);
                black_box(grid.cell_level(17, 0).unwrap());
            }
        })
    });
}

criterion_group!(benches, bench_spatial_diffusion, bench_lazy_global_reads);
criterion_main!(benches);
