//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::HotswapConfig;
use crate::error::{HotswapError, Result};
use crate::modeler::{EngineFamily, EngineKind, ModelSelector, NamFamily, RtNeuralFamily};
use crate::neural::{MockLoader, ModelMetadata};
use crate::worker::{LoadWorker, WorkerEvent};

/// Drive of the mock NAM engine used for offline renders
const NAM_MOCK_DRIVE: f32 = 2.0;

/// Drive of the mock RTNeural engine used for offline renders
const RTNEURAL_MOCK_DRIVE: f32 = 4.0;

/// How long a render waits for a swap still in flight at end of input
const SWAP_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Classify
// ============================================================================

/// Print the engine kind for each path.
pub fn classify(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        match EngineKind::classify(path) {
            Some(kind) => println!("{}: {}", path.display(), kind),
            None => println!("{}: unrecognized (active modeler unchanged)", path.display()),
        }
    }
    Ok(())
}

// ============================================================================
// Scan
// ============================================================================

/// One model file found by `scan_models`
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub kind: EngineKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ModelMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Find every model file under `dir` and resolve its metadata
///
/// Files whose metadata can't be read are still listed, with the error.
pub fn scan_models(dir: &Path) -> Result<Vec<ScanEntry>> {
    if !dir.is_dir() {
        return Err(HotswapError::FileNotFound {
            path: dir.to_path_buf(),
            source: None,
        });
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(kind) = EngineKind::classify(path) else {
            continue;
        };

        let metadata = match kind {
            EngineKind::Nam => NamFamily::read_metadata(path),
            EngineKind::RtNeural => RtNeuralFamily::read_metadata(path),
            EngineKind::None => continue,
        };
        let (metadata, error) = match metadata {
            Ok(meta) => (Some(meta), None),
            Err(e) => {
                debug!("Unreadable model {}: {}", path.display(), e);
                (None, Some(e.to_string()))
            }
        };
        entries.push(ScanEntry {
            path: path.to_path_buf(),
            kind,
            metadata,
            error,
        });
    }
    Ok(entries)
}

/// List model files under a directory.
pub fn scan(dir: &Path, json: bool) -> Result<()> {
    info!("Scanning {} for models", dir.display());
    let entries = scan_models(dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No model files found.");
        return Ok(());
    }

    println!("{:<9} {:>7} {:>8} {:>9}  Path", "Kind", "Rate", "Latency", "Loudness");
    println!("{:-<60}", "");
    for entry in &entries {
        match (&entry.metadata, &entry.error) {
            (Some(meta), _) => println!(
                "{:<9} {:>7} {:>8} {:>9}  {}",
                entry.kind,
                meta.sample_rate,
                meta.latency,
                meta.loudness
                    .map(|l| format!("{:.1} dB", l))
                    .unwrap_or_else(|| "-".to_string()),
                entry.path.display()
            ),
            (None, error) => println!(
                "{:<9} {:>7} {:>8} {:>9}  {} ({})",
                entry.kind,
                "?",
                "?",
                "?",
                entry.path.display(),
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    Ok(())
}

// ============================================================================
// Render
// ============================================================================

/// Settings for an offline render
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub model: PathBuf,
    pub swap_to: Option<PathBuf>,
    /// Swap request time in seconds
    pub swap_at: f64,
    pub block_size: usize,
    pub normalize: bool,
    pub config: HotswapConfig,
}

/// What happened during a render
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub sample_rate: u32,
    pub frames: usize,
    pub blocks: usize,
    /// Phase offset of the model active at the end
    pub phase_offset: u32,
    pub final_kind: EngineKind,
    pub events: Vec<WorkerEvent>,
}

/// Run a WAV file through a `ModelSelector` the way a host would
///
/// The first model is loaded before any audio runs. A swap is requested on
/// the loader thread once `swap_at` seconds have been processed; while it is
/// in flight blocks are paced at real time so the fade out can complete.
pub fn render_file(options: &RenderOptions) -> Result<RenderReport> {
    if options.block_size == 0 || options.block_size > options.config.max_block_size {
        return Err(HotswapError::InvalidConfig {
            reason: format!(
                "block size must be in 1..={}, got {}",
                options.config.max_block_size, options.block_size
            ),
        });
    }

    let (input, sample_rate) = read_mono(&options.input)?;
    info!(
        "Rendering {} ({} frames at {} Hz)",
        options.input.display(),
        input.len(),
        sample_rate
    );

    let selector = Arc::new(ModelSelector::new(
        options.config.clone(),
        Arc::new(MockLoader::with_drive(NAM_MOCK_DRIVE)),
        Arc::new(MockLoader::with_drive(RTNEURAL_MOCK_DRIVE)),
    ));
    selector.initialize(sample_rate);
    selector.set_model_file(&options.model);
    selector.load_model()?;

    let worker = LoadWorker::spawn(Arc::clone(&selector))?;
    let swap_frame = (options.swap_at.max(0.0) * sample_rate as f64) as usize;
    let block_time = Duration::from_secs_f64(options.block_size as f64 / sample_rate as f64);

    let mut output = vec![0.0_f32; input.len()];
    let mut events = Vec::new();
    let mut swap_pending = options.swap_to.clone();
    let mut swap_in_flight = false;
    let mut blocks = 0;

    for (index, (src, dst)) in input
        .chunks(options.block_size)
        .zip(output.chunks_mut(options.block_size))
        .enumerate()
    {
        let frame = index * options.block_size;
        if frame >= swap_frame {
            if let Some(target) = swap_pending.take() {
                info!("Requesting swap to {} at frame {}", target.display(), frame);
                worker.request_load(target)?;
                swap_in_flight = true;
            }
        }

        selector.compute(src, dst);
        if options.normalize {
            selector.normalize(dst);
        }
        blocks += 1;

        if swap_in_flight {
            while let Ok(event) = worker.events().try_recv() {
                log_event(&event);
                events.push(event);
                swap_in_flight = false;
            }
            if swap_in_flight {
                std::thread::sleep(block_time);
            }
        }
    }

    if swap_in_flight {
        match worker.next_event(SWAP_SETTLE_TIMEOUT)? {
            Some(event) => {
                log_event(&event);
                events.push(event);
            }
            None => warn!("Swap still in flight at end of input"),
        }
    }
    worker.shutdown()?;

    write_mono(&options.output, &output, sample_rate)?;
    info!("Wrote {}", options.output.display());

    Ok(RenderReport {
        sample_rate,
        frames: output.len(),
        blocks,
        phase_offset: selector.phase_offset(),
        final_kind: selector.active_kind(),
        events,
    })
}

/// Render a WAV file and print a summary.
pub fn render(options: &RenderOptions) -> Result<()> {
    let report = render_file(options)?;

    println!("Rendered: {}", options.output.display());
    println!("Frames: {} ({} blocks)", report.frames, report.blocks);
    println!("Active modeler: {}", report.final_kind);
    println!("Phase offset: {} samples", report.phase_offset);
    for event in &report.events {
        match event {
            WorkerEvent::Loaded { path, switch, .. } => {
                println!("Swapped to {} ({:?})", path.display(), switch)
            }
            WorkerEvent::Failed { path, error, .. } => {
                println!("Swap to {} failed: {}", path.display(), error)
            }
            WorkerEvent::Unloaded => println!("Model unloaded"),
        }
    }
    Ok(())
}

fn log_event(event: &WorkerEvent) {
    match event {
        WorkerEvent::Failed { path, error, .. } => {
            warn!("Load of {} failed: {}", path.display(), error)
        }
        other => debug!("Loader event: {:?}", other),
    }
}

// ============================================================================
// WAV I/O
// ============================================================================

fn wav_error(path: &Path, e: hound::Error) -> HotswapError {
    match e {
        hound::Error::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
            HotswapError::FileNotFound {
                path: path.to_path_buf(),
                source: Some(io),
            }
        }
        hound::Error::IoError(io) => HotswapError::Io(io),
        other => HotswapError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{}: {}", path.display(), other),
        )),
    }
}

/// Read a WAV file as mono f32, averaging channels
pub fn read_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = WavReader::open(path).map_err(|e| wav_error(path, e))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| wav_error(path, e))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| wav_error(path, e))?
        }
    };

    let mono = samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

/// Write mono 32-bit float WAV
pub fn write_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec).map_err(|e| wav_error(path, e))?;
    for &sample in samples {
        writer.write_sample(sample).map_err(|e| wav_error(path, e))?;
    }
    writer.finalize().map_err(|e| wav_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_scan_lists_only_models() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.nam"), r#"{"sample_rate":44100}"#).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"samplerate":96000}"#).unwrap();
        fs::write(dir.path().join("c.wav"), b"RIFF").unwrap();
        fs::write(dir.path().join("d.nam"), "{ broken").unwrap();

        let entries = scan_models(dir.path()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, EngineKind::Nam);
        assert_eq!(entries[0].metadata.as_ref().unwrap().sample_rate, 44100);
        assert_eq!(entries[1].kind, EngineKind::RtNeural);
        assert!(entries[2].error.is_some());
    }

    #[test]
    fn test_scan_missing_dir() {
        let dir = tempdir().unwrap();
        let err = scan_models(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_wav_roundtrip_mixes_to_mono() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(16384_i16).unwrap();
            writer.write_sample(0_i16).unwrap();
        }
        writer.finalize().unwrap();

        let (mono, rate) = read_mono(&path).unwrap();
        assert_eq!(rate, 44100);
        assert_eq!(mono.len(), 10);
        assert!((mono[0] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_render_rejects_zero_block() {
        let dir = tempdir().unwrap();
        let options = RenderOptions {
            input: dir.path().join("in.wav"),
            output: dir.path().join("out.wav"),
            model: dir.path().join("amp.nam"),
            swap_to: None,
            swap_at: 0.0,
            block_size: 0,
            normalize: false,
            config: HotswapConfig::default(),
        };
        assert_eq!(render_file(&options).unwrap_err().error_code(), "INVALID_CONFIG");
    }
}
