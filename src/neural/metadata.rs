//! Model file metadata resolution
//!
//! Reads only what the hot-swap core needs (trained sample rate, latency,
//! loudness) from the two supported file families. Weights are left to the
//! engine loaders.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::model::{ModelMetadata, DEFAULT_MODEL_SAMPLE_RATE};
use crate::error::{HotswapError, Result};

/// Highest sample rate accepted from a model file
const MAX_MODEL_SAMPLE_RATE: f64 = 768_000.0;

/// Top-level layout of a `.nam` file (unused fields are skipped)
#[derive(Deserialize)]
struct RawNamFile {
    version: Option<String>,
    architecture: Option<String>,
    sample_rate: Option<f64>,
    metadata: Option<RawNamMetadata>,
}

#[derive(Deserialize)]
struct RawNamMetadata {
    sample_rate: Option<f64>,
    loudness: Option<f64>,
    latency: Option<f64>,
}

/// Resolve metadata from a `.nam` file
///
/// Sample rate precedence: top-level `sample_rate`, then
/// `metadata.sample_rate`, then 48 kHz.
pub fn read_nam_metadata(path: &Path) -> Result<ModelMetadata> {
    let raw = read_model_file(path)?;
    let file: RawNamFile = serde_json::from_str(&raw).map_err(|e| HotswapError::LoadFailure {
        path: path.to_path_buf(),
        reason: "not a valid .nam file".to_string(),
        source: Some(Box::new(e)),
    })?;

    if let Some(ref version) = file.version {
        if !["0.5", "0.6", "0.7"].iter().any(|v| version.starts_with(v)) {
            log::warn!(
                "NAM version '{}' in {} may not be fully supported",
                version,
                path.display()
            );
        }
    }

    let meta = file.metadata.as_ref();
    let sample_rate = file
        .sample_rate
        .or_else(|| meta.and_then(|m| m.sample_rate));

    Ok(ModelMetadata {
        sample_rate: validate_sample_rate(path, sample_rate)?,
        latency: validate_latency(path, meta.and_then(|m| m.latency))?,
        loudness: meta.and_then(|m| m.loudness).map(|l| l as f32),
        architecture: file.architecture,
    })
}

/// Resolve metadata from an RTNeural `.json` / `.aidax` file
///
/// The rate is looked up as `samplerate` or `sample_rate`, first at the top
/// level and then inside `metadata`, defaulting to 48 kHz.
pub fn read_rtneural_metadata(path: &Path) -> Result<ModelMetadata> {
    let raw = read_model_file(path)?;
    let root: Value = serde_json::from_str(&raw).map_err(|e| HotswapError::LoadFailure {
        path: path.to_path_buf(),
        reason: "not a valid RTNeural model file".to_string(),
        source: Some(Box::new(e)),
    })?;
    if !root.is_object() {
        return Err(HotswapError::load_failure(path, "model root is not a JSON object"));
    }

    let sample_rate = lookup(&root, "samplerate")
        .or_else(|| lookup(&root, "sample_rate"))
        .and_then(Value::as_f64);
    let latency = lookup(&root, "latency").and_then(Value::as_f64);
    let loudness = lookup(&root, "loudness").and_then(Value::as_f64);
    let architecture = root
        .get("layers")
        .and_then(Value::as_array)
        .and_then(|layers| layers.first())
        .and_then(|layer| layer.get("type"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ModelMetadata {
        sample_rate: validate_sample_rate(path, sample_rate)?,
        latency: validate_latency(path, latency)?,
        loudness: loudness.map(|l| l as f32),
        architecture,
    })
}

/// Top-level key, falling back to the same key inside `metadata`
fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    root.get(key)
        .or_else(|| root.get("metadata").and_then(|m| m.get(key)))
}

fn read_model_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => HotswapError::FileNotFound {
            path: path.to_path_buf(),
            source: Some(e),
        },
        _ => HotswapError::LoadFailure {
            path: path.to_path_buf(),
            reason: "unreadable model file".to_string(),
            source: Some(Box::new(e)),
        },
    })
}

fn validate_sample_rate(path: &Path, rate: Option<f64>) -> Result<u32> {
    match rate {
        None => Ok(DEFAULT_MODEL_SAMPLE_RATE),
        Some(r) if r.is_finite() && r >= 1.0 && r <= MAX_MODEL_SAMPLE_RATE => Ok(r.round() as u32),
        Some(r) => Err(HotswapError::InvalidMetadata {
            path: path.to_path_buf(),
            reason: format!("sample rate {} out of range", r),
        }),
    }
}

fn validate_latency(path: &Path, latency: Option<f64>) -> Result<u32> {
    match latency {
        None => Ok(0),
        Some(l) if l.is_finite() && l >= 0.0 && l <= u32::MAX as f64 => Ok(l.round() as u32),
        Some(l) => Err(HotswapError::InvalidMetadata {
            path: path.to_path_buf(),
            reason: format!("latency {} out of range", l),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_nam_top_level_rate_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("amp.nam");
        fs::write(
            &path,
            r#"{"version":"0.5.2","architecture":"WaveNet","config":{},"weights":[0.1],
                "sample_rate":44100,"metadata":{"sample_rate":96000,"loudness":-12.5}}"#,
        )
        .unwrap();

        let meta = read_nam_metadata(&path).unwrap();
        assert_eq!(meta.sample_rate, 44100);
        assert_eq!(meta.loudness, Some(-12.5));
        assert_eq!(meta.architecture.as_deref(), Some("WaveNet"));
    }

    #[test]
    fn test_nam_defaults_to_48k() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("amp.nam");
        fs::write(&path, r#"{"architecture":"LSTM","weights":[]}"#).unwrap();

        let meta = read_nam_metadata(&path).unwrap();
        assert_eq!(meta.sample_rate, 48000);
        assert!(meta.loudness.is_none());
    }

    #[test]
    fn test_rtneural_samplerate_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("amp.json");
        fs::write(
            &path,
            r#"{"in_shape":[null,null,1],"samplerate":44100,"layers":[{"type":"lstm"}]}"#,
        )
        .unwrap();

        let meta = read_rtneural_metadata(&path).unwrap();
        assert_eq!(meta.sample_rate, 44100);
        assert_eq!(meta.architecture.as_deref(), Some("lstm"));
    }

    #[test]
    fn test_rtneural_nested_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("amp.aidax");
        fs::write(&path, r#"{"metadata":{"sample_rate":96000,"latency":12}}"#).unwrap();

        let meta = read_rtneural_metadata(&path).unwrap();
        assert_eq!(meta.sample_rate, 96000);
        assert_eq!(meta.latency, 12);
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("amp.json");
        fs::write(&path, r#"{"samplerate":-1}"#).unwrap();

        let err = read_rtneural_metadata(&path).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_METADATA");
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempdir().unwrap();
        let missing = read_nam_metadata(&dir.path().join("nope.nam")).unwrap_err();
        assert_eq!(missing.error_code(), "FILE_NOT_FOUND");

        let path = dir.path().join("broken.nam");
        fs::write(&path, "{ not json").unwrap();
        let broken = read_nam_metadata(&path).unwrap_err();
        assert_eq!(broken.error_code(), "LOAD_FAILURE");
    }
}
