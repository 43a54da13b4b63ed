/* benches/energy_physics.rs */
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spectral_lattice::physics::{
    apply_coherence_loss, apply_energy_transfer, calculate_total_energy, check_fracture, transfer_energy, ChannelId,
    ChannelSet, PhysicsParams, SpectralChannel, SpectralCoefficient, SpectralObject, TransferOptions,
};

fn object(harmonics: usize, capacity: f64) -> SpectralObject {
    let channel = |offset: f64| {
        let coefficients = (0..harmonics)
            .map(|k| SpectralCoefficient::new(1.0 / (k as f64 + 1.0) + offset, k as f64 * 0.1))
            .collect();
        Some(SpectralChannel::new(2.0 + offset, 0.0, coefficients))
    };
    let channels = ChannelSet::default()
        .with(ChannelId::Red, channel(0.0))
        .with(ChannelId::Green, channel(0.25))
        .with(ChannelId::Blue, channel(0.5))
        .with(ChannelId::Alpha, channel(0.75));
    SpectralObject::new(channels, capacity, PhysicsParams::new(0.1, capacity * 0.9)).expect("finite coefficients")
}

/// Energy accounting and fracture checks over growing harmonic counts
fn bench_energy_accounting(c: &mut Criterion) {
    let mut group = c.benchmark_group("energy_accounting");

    for harmonics in [4, 64, 1024] {
        let obj = object(harmonics, 1e6);
        group.throughput(Throughput::Elements((harmonics * 4) as u64));
        group.bench_with_input(BenchmarkId::new("total_energy", harmonics), &obj, |b, obj| {
            b.iter(|| black_box(calculate_total_energy(black_box(obj))))
        });
        group.bench_with_input(BenchmarkId::new("coherence_loss", harmonics), &obj, |b, obj| {
            b.iter(|| black_box(apply_coherence_loss(black_box(obj), 0.5)))
        });
        group.bench_with_input(BenchmarkId::new("fracture_check", harmonics), &obj, |b, obj| {
            b.iter(|| black_box(check_fracture(black_box(obj))))
        });
    }

    group.finish();
}

/// Transfer planning versus applying the plan to both objects
fn bench_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("energy_transfer");

    let source = object(64, 1e6);
    let target = object(64, 1e6);
    let options = TransferOptions::default().with_efficiency(0.8);

    group.bench_function("plan", |b| {
        b.iter(|| black_box(transfer_energy(black_box(&source), black_box(&target), 5.0, &options)))
    });
    group.bench_function("apply", |b| {
        b.iter(|| black_box(apply_energy_transfer(black_box(&source), black_box(&target), 5.0, &options)))
    });

    group.finish();
}

criterion_group!(benches, bench_energy_accounting, bench_transfer);
criterion_main!(benches);
