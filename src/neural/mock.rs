//! Mock inference engines for testing and offline demos
//!
//! These engines don't run a neural network. They apply a static
//! waveshaper (or nothing) and delay the signal by the latency the model
//! file declares, which is enough to exercise loading, rate bridging and
//! ramps end to end with verifiable output.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::model::{EngineLoader, InferenceEngine, ModelMetadata};
use crate::error::{HotswapError, Result};

/// Static stand-in for a neural model
#[derive(Debug, Clone)]
pub struct MockEngine {
    /// `tanh(drive * x)`; zero means identity
    drive: f32,
    delay_line: Vec<f32>,
    delay_pos: usize,
}

impl MockEngine {
    /// Engine that passes audio through unchanged, delayed by `latency` samples
    pub fn identity(latency: u32) -> Self {
        Self::waveshaper(0.0, latency)
    }

    /// Engine that soft-clips with `tanh(drive * x)`
    pub fn waveshaper(drive: f32, latency: u32) -> Self {
        Self {
            drive: drive.max(0.0),
            delay_line: vec![0.0; latency as usize],
            delay_pos: 0,
        }
    }

    #[inline]
    fn shape(&self, x: f32) -> f32 {
        if self.drive == 0.0 {
            x
        } else {
            (self.drive * x).tanh()
        }
    }
}

impl InferenceEngine for MockEngine {
    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &x) in output.iter_mut().zip(input) {
            let shaped = self.shape(x);
            *out = if self.delay_line.is_empty() {
                shaped
            } else {
                let delayed = self.delay_line[self.delay_pos];
                self.delay_line[self.delay_pos] = shaped;
                self.delay_pos = (self.delay_pos + 1) % self.delay_line.len();
                delayed
            };
        }
    }

    fn reset(&mut self) {
        self.delay_line.fill(0.0);
        self.delay_pos = 0;
    }

    fn latency(&self) -> u32 {
        self.delay_line.len() as u32
    }

    fn prewarm(&mut self) {
        self.reset();
    }
}

/// Loader producing `MockEngine`s
///
/// Counts successful loads and can simulate slow or failing construction.
#[derive(Debug, Default)]
pub struct MockLoader {
    drive: f32,
    load_delay: Option<Duration>,
    fail_marker: Option<String>,
    loads: AtomicUsize,
}

impl MockLoader {
    /// Loader whose engines pass audio through unchanged
    pub fn identity() -> Self {
        Self::default()
    }

    /// Loader whose engines soft-clip with the given drive
    pub fn with_drive(drive: f32) -> Self {
        Self {
            drive,
            ..Self::default()
        }
    }

    /// Sleep this long inside every `load` call
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// Fail any load whose file name contains `marker`
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Number of engines built so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl EngineLoader for MockLoader {
    fn load(&self, path: &Path, metadata: &ModelMetadata) -> Result<Box<dyn InferenceEngine>> {
        if let Some(delay) = self.load_delay {
            std::thread::sleep(delay);
        }

        if let Some(ref marker) = self.fail_marker {
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            if name.contains(marker.as_str()) {
                return Err(HotswapError::load_failure(path, "mock engine refused weights"));
            }
        }

        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MockEngine::waveshaper(self.drive, metadata.latency)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_passthrough() {
        let mut engine = MockEngine::identity(0);
        let input = [0.1, -0.2, 0.3];
        let mut output = [0.0; 3];
        engine.process(&input, &mut output);
        assert_eq!(output, input);
    }

    #[test]
    fn test_latency_delays_signal() {
        let mut engine = MockEngine::identity(2);
        let mut output = [0.0; 4];
        engine.process(&[1.0, 2.0, 3.0, 4.0], &mut output);
        assert_eq!(output, [0.0, 0.0, 1.0, 2.0]);
        assert_eq!(engine.latency(), 2);

        engine.reset();
        engine.process(&[5.0, 6.0, 7.0, 8.0], &mut output);
        assert_eq!(output, [0.0, 0.0, 5.0, 6.0]);
    }

    #[test]
    fn test_waveshaper_bounded() {
        let mut engine = MockEngine::waveshaper(10.0, 0);
        let mut output = [0.0; 2];
        engine.process(&[5.0, -5.0], &mut output);
        assert!(output.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_loader_counts_and_fails() {
        let loader = MockLoader::identity().failing_on("broken");
        let meta = ModelMetadata::default();

        assert!(loader.load(Path::new("good.nam"), &meta).is_ok());
        let err = loader.load(Path::new("broken.nam"), &meta).err().unwrap();
        assert_eq!(err.error_code(), "LOAD_FAILURE");
        assert_eq!(loader.load_count(), 1);
    }
}
