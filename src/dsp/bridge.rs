//! Host-rate ↔ model-rate bridge
//!
//! Wraps an inference step between two fixed-ratio resamplers. The number of
//! samples coming back from the model side fluctuates by a sample or two
//! per block, so the returned audio passes through a small FIFO primed with
//! silence: every call yields exactly as many samples as it was given, and
//! the priming depth is folded into the reported latency.

use super::resampler::PolyphaseResampler;

/// Silence samples queued ahead of the first real output
const FIFO_PRIME: usize = 2;

/// Extra headroom on every scratch buffer
const SCRATCH_MARGIN: usize = 64;

/// Resampling bridge for one host/model rate pair
#[derive(Debug, Clone)]
pub struct ResampleBridge {
    to_model: PolyphaseResampler,
    from_model: PolyphaseResampler,
    host_rate: u32,
    model_rate: u32,
    max_block: usize,
    model_in: Vec<f32>,
    model_out: Vec<f32>,
    returned: Vec<f32>,
    fifo: Vec<f32>,
    fifo_read: usize,
    fifo_len: usize,
}

impl ResampleBridge {
    /// Build a bridge for blocks of up to `max_block` host samples
    ///
    /// Allocates every buffer it will ever use; call off the audio thread.
    pub fn new(host_rate: u32, model_rate: u32, max_block: usize) -> Self {
        let max_block = max_block.max(1);
        let model_len = PolyphaseResampler::max_output_len(max_block, host_rate, model_rate)
            + SCRATCH_MARGIN;
        let back_len =
            PolyphaseResampler::max_output_len(model_len, model_rate, host_rate) + SCRATCH_MARGIN;

        let mut bridge = Self {
            to_model: PolyphaseResampler::new(host_rate, model_rate),
            from_model: PolyphaseResampler::new(model_rate, host_rate),
            host_rate,
            model_rate,
            max_block,
            model_in: vec![0.0; model_len],
            model_out: vec![0.0; model_len],
            returned: vec![0.0; back_len],
            fifo: vec![0.0; back_len + max_block + FIFO_PRIME],
            fifo_read: 0,
            fifo_len: 0,
        };
        bridge.prime();
        bridge
    }

    /// Run one host block through `step` at the model rate
    ///
    /// `input` and `output` must have the same length, at most `max_block`.
    /// `step` receives the model-rate input and a same-length output slice.
    pub fn process<F>(&mut self, input: &[f32], output: &mut [f32], mut step: F)
    where
        F: FnMut(&[f32], &mut [f32]),
    {
        let count = input.len().min(output.len()).min(self.max_block);

        let n_model = self
            .to_model
            .process(&input[..count], &mut self.model_in)
            .min(self.model_in.len());
        step(&self.model_in[..n_model], &mut self.model_out[..n_model]);

        let n_back = self
            .from_model
            .process(&self.model_out[..n_model], &mut self.returned)
            .min(self.returned.len());
        self.push(n_back);
        self.pop(&mut output[..count]);
        output[count..].fill(0.0);
    }

    /// Total latency in host samples: both filters plus FIFO priming
    pub fn latency(&self) -> u32 {
        let up = self.to_model.latency();
        let down = self.from_model.latency() * self.host_rate as f32 / self.model_rate as f32;
        (up + down).round() as u32 + FIFO_PRIME as u32
    }

    /// Clear filter history and re-prime the FIFO
    pub fn reset(&mut self) {
        self.to_model.reset();
        self.from_model.reset();
        self.prime();
    }

    pub fn host_rate(&self) -> u32 {
        self.host_rate
    }

    pub fn model_rate(&self) -> u32 {
        self.model_rate
    }

    pub fn max_block(&self) -> usize {
        self.max_block
    }

    fn prime(&mut self) {
        self.fifo.fill(0.0);
        self.fifo_read = 0;
        self.fifo_len = FIFO_PRIME;
    }

    fn push(&mut self, count: usize) {
        let cap = self.fifo.len();
        let free = cap - self.fifo_len;
        debug_assert!(count <= free, "bridge FIFO overflow");
        for i in 0..count.min(free) {
            let idx = (self.fifo_read + self.fifo_len) % cap;
            self.fifo[idx] = self.returned[i];
            self.fifo_len += 1;
        }
    }

    fn pop(&mut self, output: &mut [f32]) {
        let cap = self.fifo.len();
        for sample in output.iter_mut() {
            if self.fifo_len == 0 {
                *sample = 0.0;
                continue;
            }
            *sample = self.fifo[self.fifo_read];
            self.fifo_read = (self.fifo_read + 1) % cap;
            self.fifo_len -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough(input: &[f32], output: &mut [f32]) {
        output.copy_from_slice(input);
    }

    #[test]
    fn test_block_count_is_preserved() {
        let mut bridge = ResampleBridge::new(44100, 48000, 512);
        for block in [64, 128, 100, 512, 1] {
            let input = vec![0.5; block];
            let mut output = vec![9.0; block];
            bridge.process(&input, &mut output, passthrough);
            assert!(output.iter().all(|s| s.is_finite() && *s != 9.0));
        }
    }

    #[test]
    fn test_fifo_never_runs_dry() {
        let mut bridge = ResampleBridge::new(48000, 44100, 256);
        let input = vec![1.0; 256];
        let mut output = vec![0.0; 256];
        for _ in 0..50 {
            bridge.process(&input, &mut output, passthrough);
        }
        // After the filters settle a DC input must come back as DC
        let mean = output.iter().sum::<f32>() / output.len() as f32;
        assert!((mean - 1.0).abs() < 0.05, "mean {}", mean);
        assert!(output.iter().all(|&s| s > 0.5));
    }

    #[test]
    fn test_step_sees_model_rate_block() {
        let mut bridge = ResampleBridge::new(44100, 48000, 512);
        let mut seen = Vec::new();
        let input = vec![0.0; 441];
        let mut output = vec![0.0; 441];
        bridge.process(&input, &mut output, |i, o| {
            seen.push(i.len());
            o.copy_from_slice(i);
        });
        assert!((seen[0] as i32 - 480).abs() <= 1);
    }

    #[test]
    fn test_latency_includes_both_filters() {
        let bridge = ResampleBridge::new(44100, 48000, 512);
        // ~8 host samples in, ~8 model samples back (7.35 host), plus priming
        let latency = bridge.latency();
        assert!((16..=19).contains(&latency), "latency {}", latency);
    }

    #[test]
    fn test_impulse_arrives_at_reported_latency() {
        let mut bridge = ResampleBridge::new(44100, 48000, 1024);
        let mut input = vec![0.0; 1024];
        input[0] = 1.0;
        let mut output = vec![0.0; 1024];
        bridge.process(&input, &mut output, passthrough);

        let peak = output
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap();
        assert!((peak as i64 - bridge.latency() as i64).abs() <= 1, "peak at {}", peak);
    }
}
