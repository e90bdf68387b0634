//! Per-family behavior plugged into `EngineAdapter`

use std::path::Path;

use super::EngineKind;
use crate::dsp::db_to_linear;
use crate::error::Result;
use crate::neural::{read_nam_metadata, read_rtneural_metadata, ModelMetadata};

/// What differs between engine families
///
/// Everything else (loading protocol, resampling, ramps, teardown) is shared
/// by `EngineAdapter`.
pub trait EngineFamily: Send + Sync + 'static {
    const KIND: EngineKind;

    /// Name used in logs
    const NAME: &'static str;

    /// Resolve sample rate, latency and loudness from a model file
    fn read_metadata(path: &Path) -> Result<ModelMetadata>;

    /// Linear gain `normalize` applies for this model
    fn normalization_gain(metadata: &ModelMetadata, target_db: f32) -> f32;
}

/// Neural Amp Modeler (`.nam`)
#[derive(Debug, Clone, Copy, Default)]
pub struct NamFamily;

impl EngineFamily for NamFamily {
    const KIND: EngineKind = EngineKind::Nam;
    const NAME: &'static str = "NAM";

    fn read_metadata(path: &Path) -> Result<ModelMetadata> {
        read_nam_metadata(path)
    }

    /// Brings a model with recorded loudness to `target_db`; unity otherwise
    fn normalization_gain(metadata: &ModelMetadata, target_db: f32) -> f32 {
        match metadata.loudness {
            Some(loudness) if loudness.is_finite() => db_to_linear(target_db - loudness),
            _ => 1.0,
        }
    }
}

/// RTNeural (`.json`, `.aidax`)
#[derive(Debug, Clone, Copy, Default)]
pub struct RtNeuralFamily;

impl EngineFamily for RtNeuralFamily {
    const KIND: EngineKind = EngineKind::RtNeural;
    const NAME: &'static str = "RTNeural";

    fn read_metadata(path: &Path) -> Result<ModelMetadata> {
        read_rtneural_metadata(path)
    }

    /// RTNeural models carry no calibration
    fn normalization_gain(_metadata: &ModelMetadata, _target_db: f32) -> f32 {
        1.0
    }
}
