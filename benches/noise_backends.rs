/* benches/noise_backends.rs */
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion, PlotConfiguration,
    Throughput,
};
use spectral_lattice::{
    sampler, EngineConfig, FallbackBackend, LatticeSize, NoiseEngine, NoiseKind, NoiseParams, TransformRequest,
};
use std::time::Duration;

/// Sequential noise generation per kind and lattice size
fn bench_fallback_noise(c: &mut Criterion) {
    let mut group = c.benchmark_group("fallback_noise");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));
    group.measurement_time(Duration::from_secs(5));

    let backend = FallbackBackend::new();
    for kind in [NoiseKind::Gradient, NoiseKind::CellularDistance, NoiseKind::CellularEdge] {
        for size in [LatticeSize::S8, LatticeSize::S16, LatticeSize::S32] {
            let params = NoiseParams::new(kind, size);
            group.throughput(Throughput::Elements(size.total_elements() as u64));
            group.bench_with_input(BenchmarkId::new(kind.as_str(), size.get()), &params, |b, params| {
                b.iter(|| black_box(backend.noise(black_box(params))))
            });
        }
    }

    group.finish();
}

/// Fractal depth cost of the gradient sampler
fn bench_octaves(c: &mut Criterion) {
    let mut group = c.benchmark_group("gradient_octaves");

    for octaves in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("fractal_noise", octaves), &octaves, |b, &octaves| {
            let point = sampler::Vec3::new(1.3, 2.7, -0.4);
            b.iter(|| black_box(sampler::fractal_noise(black_box(point), octaves, 0.5, 7.0)))
        });
    }

    group.finish();
}

/// Full engine path: capability lookup, dispatch or fallback, timing
fn bench_engine_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_dispatch");

    let engines = [
        ("auto", NoiseEngine::new(EngineConfig::default()).expect("default config is valid")),
        ("cpu_only", NoiseEngine::new(EngineConfig::cpu_only()).expect("cpu-only config is valid")),
    ];
    let params = NoiseParams::new(NoiseKind::Gradient, LatticeSize::S16);

    for (label, engine) in &engines {
        // Probe outside the measurement
        let _ = engine.capability();
        group.throughput(Throughput::Elements(LatticeSize::S16.total_elements() as u64));
        group.bench_function(BenchmarkId::new("gradient_16", label), |b| {
            b.iter(|| black_box(engine.compute_noise(black_box(&params))))
        });
    }

    group.finish();
}

/// Host radix-2 transform with cached plans
fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("fallback_transform");

    let backend = FallbackBackend::new();
    for size in [LatticeSize::S8, LatticeSize::S16, LatticeSize::S32] {
        let n = size.total_elements();
        let real: Vec<f32> = (0..n).map(|i| ((i * 37) % 101) as f32 / 101.0).collect();
        let request = TransformRequest::forward(real, vec![0.0; n], size);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("forward", size.get()), &request, |b, request| {
            b.iter(|| black_box(backend.transform(black_box(request))))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fallback_noise,
    bench_octaves,
    bench_engine_dispatch,
    bench_transform
);
criterion_main!(benches);
