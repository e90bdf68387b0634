//! Inference engine traits and model metadata
//!
//! The forward pass of each engine family lives outside this crate. An
//! `EngineLoader` turns a model file into a boxed `InferenceEngine`; the
//! adapters only ever talk to these two traits.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sample rate assumed when a model file doesn't state one
pub const DEFAULT_MODEL_SAMPLE_RATE: u32 = 48000;

/// Metadata resolved from a model file before the engine is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Rate the model was trained at
    pub sample_rate: u32,

    /// Fixed processing latency at the model rate, in samples
    #[serde(default)]
    pub latency: u32,

    /// Calibrated output loudness in dB, if the trainer recorded it
    #[serde(default)]
    pub loudness: Option<f32>,

    /// Architecture name as written in the file (e.g. "WaveNet", "LSTM")
    #[serde(default)]
    pub architecture: Option<String>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_MODEL_SAMPLE_RATE,
            latency: 0,
            loudness: None,
            architecture: None,
        }
    }
}

/// A constructed neural model, ready to run at its native sample rate
///
/// `process` and `reset` run on the audio thread and must not allocate,
/// lock, or perform I/O.
pub trait InferenceEngine: Send {
    /// Process one block; `input` and `output` have the same length
    fn process(&mut self, input: &[f32], output: &mut [f32]);

    /// Clear recurrent state and filter memory
    fn reset(&mut self);

    /// Fixed latency at the model rate, in samples
    fn latency(&self) -> u32 {
        0
    }

    /// Settle internal state before the engine goes live
    ///
    /// Called once on the loader thread right after construction.
    fn prewarm(&mut self) {}
}

/// Builds engines of one family from model files
///
/// Runs on the loader thread: free to allocate, read files, and block.
pub trait EngineLoader: Send + Sync {
    /// Construct an engine for `path` using the already resolved `metadata`
    fn load(&self, path: &Path, metadata: &ModelMetadata) -> Result<Box<dyn InferenceEngine>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults() {
        let meta = ModelMetadata::default();
        assert_eq!(meta.sample_rate, 48000);
        assert_eq!(meta.latency, 0);
        assert!(meta.loudness.is_none());
    }

    #[test]
    fn test_metadata_deserialize_partial() {
        let meta: ModelMetadata = serde_json::from_str(r#"{ "sample_rate": 44100 }"#).unwrap();
        assert_eq!(meta.sample_rate, 44100);
        assert_eq!(meta.latency, 0);
    }
}
