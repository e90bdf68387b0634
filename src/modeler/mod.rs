//! Neural modelers
//!
//! A modeler wraps one inference engine family together with its resampling
//! bridge and fade state. `ModelSelector` owns one of each plus a no-op
//! modeler and forwards every call to whichever is active.
//!
//! # Threads
//! - Audio thread: `compute` only. Lock-free and allocation-free.
//! - Control thread: everything else. May block, allocate and read files.

mod adapter;
mod family;
mod selector;
mod sync;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::IdleOutput;
use crate::error::{HotswapError, Result};

pub use adapter::EngineAdapter;
pub use family::{EngineFamily, NamFamily, RtNeuralFamily};
pub use selector::{ModelSelector, ModelerSwitch};
pub use sync::{LoadEvent, LoadNotifier};

/// Adapter for `.nam` models
pub type NamModeler = EngineAdapter<NamFamily>;

/// Adapter for RTNeural `.json` / `.aidax` models
pub type RtNeuralModeler = EngineAdapter<RtNeuralFamily>;

// ============================================================================
// Engine Kind
// ============================================================================

/// Which modeler is (or should be) active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EngineKind {
    /// No model selected yet
    #[default]
    None = 0,
    /// Neural Amp Modeler weights (`.nam`)
    Nam = 1,
    /// RTNeural weights (`.json`, `.aidax`)
    RtNeural = 2,
}

impl EngineKind {
    /// Classify a model file by extension
    ///
    /// Returns `None` when the extension is missing or not recognized,
    /// meaning "keep whatever is active".
    pub fn classify(path: &Path) -> Option<EngineKind> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("nam") {
            Some(EngineKind::Nam)
        } else if ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("aidax") {
            Some(EngineKind::RtNeural)
        } else {
            None
        }
    }

    pub(crate) fn from_u8(value: u8) -> EngineKind {
        match value {
            1 => EngineKind::Nam,
            2 => EngineKind::RtNeural,
            _ => EngineKind::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::None => "none",
            EngineKind::Nam => "nam",
            EngineKind::RtNeural => "rtneural",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Ports
// ============================================================================

/// Host control ports a modeler reads once per block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// Gain in dB applied before inference
    InputGain,
    /// Gain in dB applied after inference, before the fade envelope
    OutputGain,
}

/// Bound control values; unbound ports read as 0 dB
#[derive(Debug, Clone, Default)]
pub struct PortBindings {
    input_gain: Option<Arc<AtomicF32>>,
    output_gain: Option<Arc<AtomicF32>>,
}

impl PortBindings {
    pub fn bind(&mut self, port: Port, control: Arc<AtomicF32>) {
        match port {
            Port::InputGain => self.input_gain = Some(control),
            Port::OutputGain => self.output_gain = Some(control),
        }
    }

    /// Current value of a port in dB
    #[inline]
    pub fn db(&self, port: Port) -> f32 {
        let slot = match port {
            Port::InputGain => &self.input_gain,
            Port::OutputGain => &self.output_gain,
        };
        slot.as_ref()
            .map(|c| c.load(Ordering::Relaxed))
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    /// All bound ports, for re-binding on another modeler
    pub fn iter(&self) -> impl Iterator<Item = (Port, &Arc<AtomicF32>)> {
        self.input_gain
            .iter()
            .map(|c| (Port::InputGain, c))
            .chain(self.output_gain.iter().map(|c| (Port::OutputGain, c)))
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Snapshot of a modeler's lifecycle counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AdapterStats {
    pub initializations: u64,
    pub loads: u64,
    pub failed_loads: u64,
    pub unloads: u64,
}

/// Lifecycle counters, updated on the control thread
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    pub initializations: AtomicU64,
    pub loads: AtomicU64,
    pub failed_loads: AtomicU64,
    pub unloads: AtomicU64,
}

impl StatCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AdapterStats {
        AdapterStats {
            initializations: self.initializations.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            failed_loads: self.failed_loads.load(Ordering::Relaxed),
            unloads: self.unloads.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Modeler Trait
// ============================================================================

/// Operations every modeler supports
///
/// All methods take `&self`: one modeler is driven from the audio thread
/// (`compute`) and the control thread (everything else) at the same time.
pub trait Modeler: Send + Sync {
    /// Record the weights file to use on the next `load_model`
    fn set_model_file(&self, path: &Path);

    /// Currently configured weights file
    fn model_file(&self) -> PathBuf;

    /// Latency of model plus resampling, in host samples; 0 when unloaded
    fn phase_offset(&self) -> u32 {
        0
    }

    /// Reset recurrent and filter state without unloading
    fn clear_state(&self) {}

    /// Set the host sample rate; drops any loaded model
    fn initialize(&self, _sample_rate: u32) {}

    /// Bind a host control port
    fn connect(&self, _port: Port, _control: Arc<AtomicF32>) {}

    /// Apply the model's static loudness correction in place
    fn normalize(&self, _buffer: &mut [f32]) {}

    /// Process one block (audio thread)
    fn compute(&self, input: &[f32], output: &mut [f32]);

    /// Build and publish the configured model (control thread)
    fn load_model(&self) -> Result<()>;

    /// Fade out and release the current model
    fn unload_model(&self) {}

    /// Release the current model immediately, without a fade
    fn cleanup(&self) {}

    /// True while a model is loaded and running
    fn is_ready(&self) -> bool {
        false
    }

    /// True when the model runs at a different rate than the host
    fn needs_resample(&self) -> bool {
        false
    }

    fn stats(&self) -> AdapterStats {
        AdapterStats::default()
    }
}

/// Write the no-model output for a block
#[inline]
pub(crate) fn write_idle(mode: IdleOutput, input: &[f32], output: &mut [f32]) {
    match mode {
        IdleOutput::Silence => output.fill(0.0),
        IdleOutput::Passthrough => {
            let n = input.len().min(output.len());
            output[..n].copy_from_slice(&input[..n]);
            output[n..].fill(0.0);
        }
    }
}

// ============================================================================
// No Model
// ============================================================================

/// Modeler active before any model file has been classified
///
/// Never produces model output; remembers the last path it was given so a
/// load attempt can report why it failed.
#[derive(Debug, Default)]
pub struct NoModel {
    idle_output: IdleOutput,
    model_file: RwLock<PathBuf>,
}

impl NoModel {
    pub fn new(idle_output: IdleOutput) -> Self {
        Self {
            idle_output,
            model_file: RwLock::new(PathBuf::new()),
        }
    }
}

impl Modeler for NoModel {
    fn set_model_file(&self, path: &Path) {
        *self.model_file.write() = path.to_path_buf();
    }

    fn model_file(&self) -> PathBuf {
        self.model_file.read().clone()
    }

    fn compute(&self, input: &[f32], output: &mut [f32]) {
        write_idle(self.idle_output, input, output);
    }

    fn load_model(&self) -> Result<()> {
        let path = self.model_file();
        if path.as_os_str().is_empty() {
            Err(HotswapError::NoModelFile)
        } else {
            Err(HotswapError::UnsupportedExtension { path })
        }
    }
}
