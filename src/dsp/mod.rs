//! Real-time DSP building blocks
//!
//! Everything here is allocation-free once constructed:
//! - `Ramp`: click-free fade envelope
//! - `PolyphaseResampler`: fixed-ratio rate conversion
//! - `ResampleBridge`: host ↔ model rate round trip with exact block accounting

pub mod bridge;
pub mod ramp;
pub mod resampler;

pub use bridge::ResampleBridge;
pub use ramp::{Ramp, RampEvent, RampState};
pub use resampler::PolyphaseResampler;

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Multiply a block by a constant gain, skipping unity
#[inline]
pub fn apply_gain(buffer: &mut [f32], gain: f32) {
    if (gain - 1.0).abs() < f32::EPSILON {
        return;
    }
    for sample in buffer.iter_mut() {
        *sample *= gain;
    }
}
