//! Click-free fade envelope
//!
//! Linear gain ramp applied to model output after a load (fade in) and
//! before a teardown (fade out). The horizon is the configured fade time
//! rounded up to whole host blocks, so a fade always ends on a block
//! boundary and its length scales with the host block size.
//!
//! Only one direction is active at a time. Reversing direction continues
//! from the current gain, never from an end point.

/// Ramp state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RampState {
    /// Unity gain, no fade in progress
    #[default]
    Idle,
    /// Gain rising towards 1.0
    RampingIn,
    /// Gain falling towards 0.0
    RampingDown,
    /// Faded out; output is muted until the next fade in
    Silent,
}

/// Something `apply` finished during a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampEvent {
    /// Nothing completed
    None,
    /// Fade in reached unity gain
    FadedIn,
    /// Fade out reached zero gain
    FadedOut,
}

/// Linear fade envelope
#[derive(Debug, Clone)]
pub struct Ramp {
    state: RampState,
    /// Current position along the horizon, `0..=ramp_div`
    ramp: usize,
    /// Horizon length in samples
    ramp_div: usize,
    /// Gain increment per sample (`1 / ramp_div`)
    ramp_step: f32,
    fade_ms: f32,
    block_size: usize,
    sample_rate: u32,
}

impl Ramp {
    /// Create a ramp at unity gain
    ///
    /// The horizon stays at one sample until `configure` is called.
    pub fn new(fade_ms: f32) -> Self {
        Self {
            state: RampState::Idle,
            ramp: 1,
            ramp_div: 1,
            ramp_step: 1.0,
            fade_ms,
            block_size: 0,
            sample_rate: 0,
        }
    }

    /// Create a ramp that starts muted, ready for a fade in
    pub fn silent(fade_ms: f32) -> Self {
        let mut ramp = Self::new(fade_ms);
        ramp.mute();
        ramp
    }

    /// Recompute the horizon for a host block size and sample rate
    ///
    /// Cheap when nothing changed; never allocates. A fade in progress keeps
    /// its current gain and continues at the new step.
    pub fn configure(&mut self, block_size: usize, sample_rate: u32) {
        if block_size == self.block_size && sample_rate == self.sample_rate {
            return;
        }
        let block = block_size.max(1);
        let fade_samples = (self.fade_ms * sample_rate as f32 / 1000.0).ceil() as usize;
        let blocks = ((fade_samples + block - 1) / block).max(1);
        let ramp_div = blocks * block;

        let gain = self.gain();
        self.ramp = ((gain * ramp_div as f32).round() as usize).min(ramp_div);
        self.ramp_div = ramp_div;
        self.ramp_step = 1.0 / ramp_div as f32;
        self.block_size = block_size;
        self.sample_rate = sample_rate;
    }

    /// Jump straight to the muted state
    ///
    /// Only for use while nothing is audible (e.g. right after publishing a
    /// freshly loaded model).
    pub fn mute(&mut self) {
        self.state = RampState::Silent;
        self.ramp = 0;
    }

    /// Start fading in from the current gain
    pub fn begin_ramp_in(&mut self) {
        match self.state {
            RampState::Silent | RampState::RampingDown => self.state = RampState::RampingIn,
            RampState::Idle | RampState::RampingIn => {}
        }
    }

    /// Start fading out from the current gain
    pub fn begin_ramp_down(&mut self) {
        match self.state {
            RampState::Idle | RampState::RampingIn => self.state = RampState::RampingDown,
            RampState::RampingDown | RampState::Silent => {}
        }
    }

    /// Apply the envelope to a block in place
    pub fn apply(&mut self, buffer: &mut [f32]) -> RampEvent {
        match self.state {
            RampState::Idle => RampEvent::None,
            RampState::Silent => {
                buffer.fill(0.0);
                RampEvent::None
            }
            _ => self.walk(buffer, |_, sample, gain| *sample *= gain),
        }
    }

    /// Blend `wet` towards `dry` as the gain falls
    ///
    /// Writes `wet * g + dry * (1 - g)`, so a silent ramp yields the dry
    /// signal and unity gain yields the wet one.
    pub fn crossfade(&mut self, wet: &mut [f32], dry: &[f32]) -> RampEvent {
        let n = wet.len().min(dry.len());
        let wet = &mut wet[..n];
        match self.state {
            RampState::Idle => RampEvent::None,
            RampState::Silent => {
                wet.copy_from_slice(&dry[..n]);
                RampEvent::None
            }
            _ => self.walk(wet, |i, sample, gain| {
                *sample = *sample * gain + dry[i] * (1.0 - gain)
            }),
        }
    }

    /// Advance a fade one sample at a time, handing each sample its gain
    fn walk(
        &mut self,
        buffer: &mut [f32],
        mut mix: impl FnMut(usize, &mut f32, f32),
    ) -> RampEvent {
        match self.state {
            RampState::RampingIn => {
                for (i, sample) in buffer.iter_mut().enumerate() {
                    if self.ramp < self.ramp_div {
                        self.ramp += 1;
                    }
                    mix(i, sample, self.gain());
                }
                if self.ramp >= self.ramp_div {
                    self.state = RampState::Idle;
                    return RampEvent::FadedIn;
                }
                RampEvent::None
            }
            RampState::RampingDown => {
                for (i, sample) in buffer.iter_mut().enumerate() {
                    self.ramp = self.ramp.saturating_sub(1);
                    mix(i, sample, self.gain());
                }
                if self.ramp == 0 {
                    self.state = RampState::Silent;
                    return RampEvent::FadedOut;
                }
                RampEvent::None
            }
            RampState::Idle | RampState::Silent => RampEvent::None,
        }
    }

    /// Current gain in `0.0..=1.0`
    #[inline]
    pub fn gain(&self) -> f32 {
        if self.ramp >= self.ramp_div {
            1.0
        } else {
            self.ramp as f32 * self.ramp_step
        }
    }

    pub fn state(&self) -> RampState {
        self.state
    }

    /// Horizon length in samples
    pub fn ramp_div(&self) -> usize {
        self.ramp_div
    }

    /// Gain change per sample
    pub fn ramp_step(&self) -> f32 {
        self.ramp_step
    }
}
