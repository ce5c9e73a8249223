use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};

use oxs_demag::{Config, Engine, MagnetizationField, MeshSpec, OutputRequest};

// ======================================================================
// UTIL

fn random_field(mesh: &MeshSpec, ms: f64, seed: u64) -> MagnetizationField {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut field = MagnetizationField::zeros(mesh);
    for i in 0..field.len() {
        let v: [f64; 3] = [
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        ];
        let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt().max(1e-12);
        field.spin_mut()[i] = [ms * v[0] / norm, ms * v[1] / norm, ms * v[2] / norm];
        field.ms_mut()[i] = ms;
    }
    field
}

// ======================================================================
// BENCHMARKS - TENSOR BUILD

fn benchmarks_tensor_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tensor-build");
    group.sample_size(10);

    for dims in [[8, 8, 8], [16, 16, 16], [32, 8, 8], [64, 4, 4]] {
        let mesh = MeshSpec::new(dims, [1e-9; 3], [false; 3]).unwrap();
        let field = random_field(&mesh, 8e5, 0);

        group.throughput(Throughput::Elements(mesh.cell_count() as u64));

        let id = format!("{}x{}x{}", dims[0], dims[1], dims[2]);
        group.bench_with_input(BenchmarkId::new("build", &id), &mesh, |b, mesh| {
            b.iter(|| {
                let mut engine = Engine::new(Config::default()).with_nthreads(4);
                let mut out = OutputRequest::default();
                black_box(engine.compute_energy(mesh, &field, &mut out).unwrap());
            });
        });
    }

    group.finish();
}

// ======================================================================
// BENCHMARKS - CONVOLUTION STEP

fn benchmarks_convolution_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("convolution-step");

    for (dims, nthreads) in [
        ([16, 16, 16], 1usize),
        ([16, 16, 16], 4),
        ([16, 16, 16], 8),
        ([32, 32, 8], 4),
    ] {
        let mesh = MeshSpec::new(dims, [1e-9; 3], [false; 3]).unwrap();
        let field = random_field(&mesh, 8e5, 1);
        let mut engine = Engine::new(Config::default()).with_nthreads(nthreads);

        // Warm up the cached tensor so the timed loop measures only the
        // per-step convolution, not the one-time build.
        let mut warmup = OutputRequest::default();
        engine.compute_energy(&mesh, &field, &mut warmup).unwrap();

        group.throughput(Throughput::Elements(mesh.cell_count() as u64));

        let id = format!("{}x{}x{} / {} threads", dims[0], dims[1], dims[2], nthreads);
        group.bench_with_input(BenchmarkId::new("step", &id), &mesh, |b, mesh| {
            b.iter(|| {
                let mut h = vec![[0.0; 3]; mesh.cell_count()];
                let mut out = OutputRequest {
                    h: Some(&mut h),
                    ..Default::default()
                };
                black_box(engine.compute_energy(mesh, &field, &mut out).unwrap());
            });
        });
    }

    group.finish();
}

// ======================================================================
// BENCHMARKS - PRECONDITIONER

fn benchmarks_preconditioner(c: &mut Criterion) {
    let mut group = c.benchmark_group("preconditioner");

    for dims in [[16, 16, 16], [32, 32, 8]] {
        let mesh = MeshSpec::new(dims, [1e-9; 3], [false; 3]).unwrap();
        let field = random_field(&mesh, 8e5, 2);
        let config = Config::default();
        let engine = Engine::new(config);

        let id = format!("{}x{}x{}", dims[0], dims[1], dims[2]);
        group.bench_with_input(BenchmarkId::new("increment", &id), &mesh, |b, mesh| {
            b.iter(|| {
                let mut diag = vec![[0.0; 3]; mesh.cell_count()];
                black_box(
                    engine
                        .increment_preconditioner(mesh, &field, &mut diag)
                        .unwrap(),
                );
            });
        });
    }

    group.finish();
}

// ======================================================================
// MAIN

criterion_group!(benches_build, benchmarks_tensor_build);
criterion_group!(benches_convolution, benchmarks_convolution_step);
criterion_group!(benches_preconditioner_group, benchmarks_preconditioner);
criterion_main!(benches_build, benches_convolution, benches_preconditioner_group);
