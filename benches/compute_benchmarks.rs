//! Compute Benchmarks
//!
//! Per-block cost of the audio path with and without rate bridging.

use std::path::PathBuf;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use neural_hotswap::dsp::{Ramp, ResampleBridge};
use neural_hotswap::neural::MockLoader;
use neural_hotswap::{HotswapConfig, ModelSelector};
use tempfile::TempDir;

const BLOCK: usize = 256;

fn loaded_selector(dir: &TempDir, host_rate: u32) -> ModelSelector {
    let path: PathBuf = dir.path().join("amp.nam");
    std::fs::write(&path, r#"{"sample_rate":48000,"metadata":{"latency":32}}"#).unwrap();

    let selector = ModelSelector::new(
        HotswapConfig::default(),
        Arc::new(MockLoader::with_drive(2.0)),
        Arc::new(MockLoader::identity()),
    );
    selector.initialize(host_rate);
    selector.set_model_file(&path);
    selector.load_model().unwrap();
    selector
}

fn sine_block() -> Vec<f32> {
    (0..BLOCK)
        .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 48000.0).sin())
        .collect()
}

fn benchmark_compute_native_rate(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let selector = loaded_selector(&dir, 48000);
    let input = sine_block();
    let mut output = vec![0.0_f32; BLOCK];

    c.bench_function("compute_256_native", |b| {
        b.iter(|| selector.compute(black_box(&input), black_box(&mut output)))
    });
}

fn benchmark_compute_resampled(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let selector = loaded_selector(&dir, 44100);
    let input = sine_block();
    let mut output = vec![0.0_f32; BLOCK];

    c.bench_function("compute_256_resampled_44k1", |b| {
        b.iter(|| selector.compute(black_box(&input), black_box(&mut output)))
    });
}

fn benchmark_bridge(c: &mut Criterion) {
    let mut bridge = ResampleBridge::new(44100, 96000, BLOCK);
    let input = sine_block();
    let mut output = vec![0.0_f32; BLOCK];

    c.bench_function("bridge_256_44k1_to_96k", |b| {
        b.iter(|| {
            bridge.process(black_box(&input), &mut output, |i, o| o.copy_from_slice(i));
        })
    });
}

fn benchmark_ramp(c: &mut Criterion) {
    let mut ramp = Ramp::silent(20.0);
    ramp.configure(BLOCK, 48000);
    let mut buffer = vec![1.0_f32; BLOCK];

    c.bench_function("ramp_256", |b| {
        b.iter(|| {
            // Alternate directions so every block does work
            if ramp.gain() >= 1.0 {
                ramp.begin_ramp_down();
            } else if ramp.gain() <= 0.0 {
                ramp.begin_ramp_in();
            }
            buffer.fill(1.0);
            ramp.apply(black_box(&mut buffer))
        })
    });
}

criterion_group!(
    benches,
    benchmark_compute_native_rate,
    benchmark_compute_resampled,
    benchmark_bridge,
    benchmark_ramp
);
criterion_main!(benches);
