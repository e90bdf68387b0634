//! Fixed-ratio polyphase resampler
//!
//! Rational L/M conversion with a Kaiser-windowed sinc prototype split into
//! L polyphase branches. Coefficients and history are allocated in `new`;
//! `process` never allocates.

use std::f32::consts::PI;

/// Taps per polyphase branch
const TAPS_PER_PHASE: usize = 16;

/// Kaiser window shape
const KAISER_BETA: f32 = 5.0;

/// Polyphase resampler for one fixed `src_rate -> dst_rate` conversion
#[derive(Debug, Clone)]
pub struct PolyphaseResampler {
    /// Branch coefficients: `[up_factor][TAPS_PER_PHASE]`
    phases: Vec<Vec<f32>>,
    /// Circular FIR delay line
    history: Vec<f32>,
    hist_pos: usize,
    /// Interpolation factor (L)
    up_factor: usize,
    /// Decimation factor (M)
    down_factor: usize,
    /// Branch selector, advanced by M per output and wrapped by L per input
    phase_acc: usize,
    src_rate: u32,
    dst_rate: u32,
}

impl PolyphaseResampler {
    /// Design a resampler converting `src_rate` to `dst_rate`
    ///
    /// Cutoff sits at `min(π/L, π/M)` of the upsampled rate so neither
    /// imaging nor aliasing passes the band edge.
    pub fn new(src_rate: u32, dst_rate: u32) -> Self {
        let g = gcd(src_rate.max(1), dst_rate.max(1));
        let up = (dst_rate.max(1) / g) as usize;
        let down = (src_rate.max(1) / g) as usize;

        let total_taps = TAPS_PER_PHASE * up;
        let cutoff = PI / up.max(down) as f32;
        let center = (total_taps - 1) as f32 / 2.0;

        let prototype: Vec<f32> = (0..total_taps)
            .map(|i| {
                let x = i as f32 - center;
                let sinc = if x.abs() < 1e-6 {
                    cutoff / PI
                } else {
                    (cutoff * x).sin() / (PI * x)
                };
                sinc * up as f32 * kaiser_window(i, total_taps, KAISER_BETA)
            })
            .collect();

        // Branch p takes taps p, p + L, p + 2L, ...
        let phases = (0..up)
            .map(|p| {
                (0..TAPS_PER_PHASE)
                    .map(|t| prototype.get(p + t * up).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();

        Self {
            phases,
            history: vec![0.0; TAPS_PER_PHASE],
            hist_pos: 0,
            up_factor: up,
            down_factor: down,
            phase_acc: 0,
            src_rate,
            dst_rate,
        }
    }

    /// Resample `input` into `output`, returning the number of samples written
    ///
    /// `output` should hold at least `max_output_len(input.len(), ..)` samples;
    /// anything beyond its length is computed and discarded.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        let taps = TAPS_PER_PHASE;
        let mut written = 0;

        for &sample in input {
            self.history[self.hist_pos] = sample;
            self.hist_pos = (self.hist_pos + 1) % taps;

            while self.phase_acc < self.up_factor {
                let coeffs = &self.phases[self.phase_acc];
                let mut acc = 0.0_f32;
                for (t, &c) in coeffs.iter().enumerate() {
                    let idx = (self.hist_pos + taps - 1 - t) % taps;
                    acc += self.history[idx] * c;
                }
                if let Some(out) = output.get_mut(written) {
                    *out = acc;
                }
                written += 1;
                self.phase_acc += self.down_factor;
            }
            self.phase_acc -= self.up_factor;
        }

        written
    }

    /// Upper bound on output samples produced for `input_len` input samples
    pub fn max_output_len(input_len: usize, src_rate: u32, dst_rate: u32) -> usize {
        let src = src_rate.max(1) as u64;
        let num = input_len as u64 * dst_rate as u64 + src - 1;
        (num / src) as usize + 1
    }

    /// Filter group delay measured in input samples
    pub fn latency(&self) -> f32 {
        (TAPS_PER_PHASE * self.up_factor - 1) as f32 / (2.0 * self.up_factor as f32)
    }

    /// Clear delay line and phase
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.hist_pos = 0;
        self.phase_acc = 0;
    }

    pub fn src_rate(&self) -> u32 {
        self.src_rate
    }

    pub fn dst_rate(&self) -> u32 {
        self.dst_rate
    }
}

/// Greatest common divisor
fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

fn kaiser_window(n: usize, len: usize, beta: f32) -> f32 {
    if len <= 1 {
        return 1.0;
    }
    let ratio = 2.0 * n as f32 / (len - 1) as f32 - 1.0;
    let arg = beta * (1.0 - ratio * ratio).max(0.0).sqrt();
    bessel_i0(arg) / bessel_i0(beta)
}

/// Zeroth-order modified Bessel function of the first kind (series expansion)
fn bessel_i0(x: f32) -> f32 {
    let mut sum = 1.0_f32;
    let mut term = 1.0_f32;
    let half = x / 2.0;
    for k in 1..25 {
        term *= (half / k as f32) * (half / k as f32);
        sum += term;
        if term < sum * 1e-8 {
            break;
        }
    }
    sum
}
