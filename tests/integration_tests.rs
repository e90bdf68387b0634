//! Integration Tests
//!
//! End-to-end offline renders: WAV in, selector with a mid-stream swap on
//! the loader thread, WAV out.

use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::{tempdir, TempDir};

use neural_hotswap::cli::commands::{read_mono, render_file, scan_models, RenderOptions};
use neural_hotswap::{EngineKind, HotswapConfig, ModelerSwitch, WorkerEvent};

/// Helper to write a 16-bit mono sine file
fn write_sine(path: &Path, frequency: f64, sample_rate: u32, duration_secs: f64) {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    let frames = (sample_rate as f64 * duration_secs) as usize;
    for i in 0..frames {
        let t = i as f64 / sample_rate as f64;
        let sample = 0.5 * (2.0 * std::f64::consts::PI * frequency * t).sin();
        writer.write_sample((sample * 32767.0) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn write_model(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path
}

fn options(dir: &TempDir, input: PathBuf, model: PathBuf) -> RenderOptions {
    RenderOptions {
        input,
        output: dir.path().join("out.wav"),
        model,
        swap_to: None,
        swap_at: 0.0,
        block_size: 256,
        normalize: false,
        config: HotswapConfig {
            fade_ms: 5.0,
            fade_timeout_ms: 2000,
            ..HotswapConfig::default()
        },
    }
}

// === Render Tests ===

#[test]
fn test_render_without_swap_preserves_length() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_sine(&input, 220.0, 48000, 0.5);
    let nam = write_model(&dir, "amp.nam", r#"{"sample_rate":48000}"#);

    let opts = options(&dir, input.clone(), nam);
    let report = render_file(&opts).unwrap();

    let (original, _) = read_mono(&input).unwrap();
    let (rendered, rate) = read_mono(&opts.output).unwrap();
    assert_eq!(rate, 48000);
    assert_eq!(rendered.len(), original.len());
    assert_eq!(report.frames, original.len());
    assert_eq!(report.final_kind, EngineKind::Nam);
    assert!(report.events.is_empty());
    assert!(rendered.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
    // Fade in starts from silence
    assert!(rendered[0].abs() < 1e-3);
}

#[test]
fn test_render_swaps_family_mid_stream() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_sine(&input, 110.0, 48000, 1.0);
    let nam = write_model(&dir, "amp.nam", r#"{"sample_rate":48000}"#);
    let json = write_model(&dir, "amp2.json", r#"{"samplerate":48000,"latency":16}"#);

    let mut opts = options(&dir, input, nam);
    opts.swap_to = Some(json.clone());
    opts.swap_at = 0.25;
    let report = render_file(&opts).unwrap();

    assert_eq!(report.final_kind, EngineKind::RtNeural);
    assert_eq!(report.phase_offset, 16);
    assert_eq!(
        report.events,
        vec![WorkerEvent::Loaded {
            path: json,
            kind: EngineKind::RtNeural,
            phase_offset: 16,
            needs_resample: false,
            switch: ModelerSwitch::Switched {
                from: EngineKind::Nam,
                to: EngineKind::RtNeural
            },
        }]
    );

    let (rendered, _) = read_mono(&opts.output).unwrap();
    assert!(rendered.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
    // Audio before and after the swap
    assert!(rendered[6000..12000].iter().any(|s| s.abs() > 0.1));
    assert!(rendered[40000..].iter().any(|s| s.abs() > 0.1));
}

#[test]
fn test_render_with_resampled_model() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_sine(&input, 440.0, 44100, 0.5);
    let nam = write_model(&dir, "amp.nam", r#"{"sample_rate":48000}"#);

    let opts = options(&dir, input, nam);
    let report = render_file(&opts).unwrap();

    assert!(report.phase_offset > 0);
    let (rendered, rate) = read_mono(&opts.output).unwrap();
    assert_eq!(rate, 44100);
    assert_eq!(rendered.len(), 22050);
    assert!(rendered[11025..].iter().any(|s| s.abs() > 0.1));
}

#[test]
fn test_render_failed_swap_keeps_first_model() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_sine(&input, 220.0, 48000, 0.5);
    let nam = write_model(&dir, "amp.nam", r#"{"sample_rate":48000}"#);

    let mut opts = options(&dir, input, nam);
    opts.swap_to = Some(dir.path().join("missing.nam"));
    opts.swap_at = 0.1;
    let report = render_file(&opts).unwrap();

    assert_eq!(report.final_kind, EngineKind::Nam);
    assert!(matches!(
        report.events.as_slice(),
        [WorkerEvent::Failed { code: "FILE_NOT_FOUND", .. }]
    ));
    let (rendered, _) = read_mono(&opts.output).unwrap();
    assert!(rendered[20000..].iter().any(|s| s.abs() > 0.1));
}

#[test]
fn test_render_missing_first_model_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_sine(&input, 220.0, 48000, 0.2);

    let opts = options(&dir, input, dir.path().join("nope.nam"));
    let err = render_file(&opts).unwrap_err();
    assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    assert!(!opts.output.exists());
}

// === Scan Tests ===

#[test]
fn test_scan_recurses_into_subdirectories() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("rigs")).unwrap();
    fs::write(dir.path().join("rigs/clean.aidax"), r#"{"samplerate":44100}"#).unwrap();
    fs::write(dir.path().join("lead.nam"), r#"{"metadata":{"loudness":-14.0}}"#).unwrap();

    let entries = scan_models(dir.path()).unwrap();
    assert_eq!(entries.len(), 2);
    let kinds: Vec<EngineKind> = entries.iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EngineKind::Nam));
    assert!(kinds.contains(&EngineKind::RtNeural));
}
