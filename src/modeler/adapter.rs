//! Engine adapter
//!
//! Drives one inference engine family through its whole lifecycle: metadata
//! resolution, construction off the audio thread, publication, host-rate
//! bridging, fades, and teardown.
//!
//! # Synchronization
//!
//! The audio thread only ever `try_lock`s the real-time state; if the
//! control thread holds it (publishing or releasing a model) the block is
//! silent. Control-thread requests reach the audio thread through atomic
//! flags:
//! - `do_ramp`: a fresh model was published, fade it in
//! - `do_ramp_down`: a teardown is waiting for the fade out to finish
//! - `clear_pending`: reset engine and filter state before the next block
//!
//! Teardown blocks on `sync_intern` until the audio thread reports the fade
//! out complete, bounded by `fade_timeout_ms` so a stalled host can't hang
//! the control thread.
//!
//! Port bindings live outside the real-time state. The audio thread reads
//! them with `try_read` and keeps the last values it saw, so rebinding a
//! port never costs a block.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use atomic_float::AtomicF32;
use parking_lot::{Condvar, Mutex, RwLock};

use super::family::EngineFamily;
use super::sync::{LoadEvent, LoadNotifier};
use super::{write_idle, AdapterStats, EngineKind, Modeler, Port, PortBindings, StatCounters};
use crate::config::{HotswapConfig, IdleOutput};
use crate::dsp::{apply_gain, db_to_linear, Ramp, RampEvent, RampState, ResampleBridge};
use crate::error::{HotswapError, Result};
use crate::neural::{EngineLoader, InferenceEngine, ModelMetadata};

/// Longest single wait while a fade out is pending
const WAIT_SLICE: Duration = Duration::from_millis(2);

/// State owned by whichever thread holds the lock, normally the audio thread
struct RtState {
    engine: Option<Box<dyn InferenceEngine>>,
    bridge: Option<ResampleBridge>,
    ramp: Ramp,
    scratch: Vec<f32>,
    /// Input and output gain in dB from the last uncontended port read
    port_db: (f32, f32),
}

/// Clears the `loading` flag however `load_model` exits
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Adapter for one engine family
pub struct EngineAdapter<F: EngineFamily> {
    loader: Arc<dyn EngineLoader>,
    config: HotswapConfig,
    notifier: Arc<LoadNotifier>,
    model_file: RwLock<PathBuf>,

    ready: AtomicBool,
    do_ramp: AtomicBool,
    do_ramp_down: AtomicBool,
    clear_pending: AtomicBool,
    loading: AtomicBool,
    needs_resample: AtomicBool,

    sample_rate_host: AtomicU32,
    sample_rate_model: AtomicU32,
    phase_offset: AtomicU32,
    norm_gain: AtomicF32,

    rt: Mutex<RtState>,
    ports: RwLock<PortBindings>,
    sync: Mutex<()>,
    sync_intern: Condvar,

    stats: StatCounters,
    _family: PhantomData<fn() -> F>,
}

impl<F: EngineFamily> EngineAdapter<F> {
    pub fn new(
        loader: Arc<dyn EngineLoader>,
        config: &HotswapConfig,
        notifier: Arc<LoadNotifier>,
    ) -> Self {
        let max_block = config.max_block_size.max(1);
        Self {
            loader,
            config: config.clone(),
            notifier,
            model_file: RwLock::new(PathBuf::new()),
            ready: AtomicBool::new(false),
            do_ramp: AtomicBool::new(false),
            do_ramp_down: AtomicBool::new(false),
            clear_pending: AtomicBool::new(false),
            loading: AtomicBool::new(false),
            needs_resample: AtomicBool::new(false),
            sample_rate_host: AtomicU32::new(0),
            sample_rate_model: AtomicU32::new(0),
            phase_offset: AtomicU32::new(0),
            norm_gain: AtomicF32::new(1.0),
            rt: Mutex::new(RtState {
                engine: None,
                bridge: None,
                ramp: Ramp::silent(config.fade_ms),
                scratch: vec![0.0; max_block],
                port_db: (0.0, 0.0),
            }),
            ports: RwLock::new(PortBindings::default()),
            sync: Mutex::new(()),
            sync_intern: Condvar::new(),
            stats: StatCounters::default(),
            _family: PhantomData,
        }
    }

    pub fn kind(&self) -> EngineKind {
        F::KIND
    }

    /// Host rate set by the last `initialize`; 0 before that
    pub fn host_sample_rate(&self) -> u32 {
        self.sample_rate_host.load(Ordering::Acquire)
    }

    /// Rate the loaded model runs at; 0 when nothing has been loaded
    pub fn model_sample_rate(&self) -> u32 {
        self.sample_rate_model.load(Ordering::Acquire)
    }

    /// Linear gain `normalize` applies
    pub fn normalization_gain(&self) -> f32 {
        self.norm_gain.load(Ordering::Acquire)
    }

    /// True while a `load_model` call is running
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Ask the audio thread to fade out, then wait for it to finish
    ///
    /// Gives up after `fade_timeout_ms`; the caller tears down regardless.
    fn fade_out(&self) {
        self.do_ramp.store(false, Ordering::Release);
        self.do_ramp_down.store(true, Ordering::Release);

        let deadline = Instant::now() + self.config.fade_timeout();
        let mut guard = self.sync.lock();
        while self.do_ramp_down.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= deadline {
                self.do_ramp_down.store(false, Ordering::Release);
                log::debug!(
                    "{} fade out not acknowledged within {} ms, tearing down anyway",
                    F::NAME,
                    self.config.fade_timeout_ms
                );
                break;
            }
            // Sliced: the audio thread signals without taking `sync`
            self.sync_intern
                .wait_for(&mut guard, (deadline - now).min(WAIT_SLICE));
        }
    }

    /// Audio side of the teardown rendezvous
    #[inline]
    fn finish_fade_out(&self) {
        self.do_ramp_down.store(false, Ordering::Release);
        self.sync_intern.notify_all();
    }

    /// Drop the engine and bridge immediately; returns whether one was loaded
    fn release(&self) -> bool {
        let (engine, bridge) = {
            let mut rt = self.rt.lock();
            self.ready.store(false, Ordering::Release);
            rt.ramp.mute();
            (rt.engine.take(), rt.bridge.take())
        };
        self.phase_offset.store(0, Ordering::Release);
        self.needs_resample.store(false, Ordering::Release);
        self.do_ramp.store(false, Ordering::Release);
        self.do_ramp_down.store(false, Ordering::Release);
        self.clear_pending.store(false, Ordering::Release);

        let had_model = engine.is_some();
        drop(engine);
        drop(bridge);
        had_model
    }

    fn record_unload(&self, how: &str) {
        StatCounters::bump(&self.stats.unloads);
        log::info!("{} model {}", F::NAME, how);
        self.notifier.notify(LoadEvent::Unloaded { kind: F::KIND });
    }

    /// Build, then publish; leaves the adapter untouched on error
    fn load_from(&self, path: &Path) -> Result<ModelMetadata> {
        if path.as_os_str().is_empty() {
            return Err(HotswapError::NoModelFile);
        }
        let host_rate = self.sample_rate_host.load(Ordering::Acquire);
        if host_rate == 0 {
            return Err(HotswapError::load_failure(
                path,
                "host sample rate not set; call initialize first",
            ));
        }

        let metadata = F::read_metadata(path)?;
        let mut engine = self.loader.load(path, &metadata)?;
        engine.prewarm();

        let model_rate = metadata.sample_rate;
        let needs_resample = host_rate != model_rate;
        let bridge = needs_resample
            .then(|| ResampleBridge::new(host_rate, model_rate, self.config.max_block_size));
        let model_latency =
            (engine.latency() as f64 * host_rate as f64 / model_rate as f64).round();
        let phase_offset = u32::try_from(model_latency as u64)
            .ok()
            .and_then(|l| l.checked_add(bridge.as_ref().map_or(0, ResampleBridge::latency)))
            .ok_or_else(|| HotswapError::InvalidMetadata {
                path: path.to_path_buf(),
                reason: format!(
                    "latency of {} samples at {} Hz does not fit at host rate {} Hz",
                    engine.latency(),
                    model_rate,
                    host_rate
                ),
            })?;
        let gain = F::normalization_gain(&metadata, self.config.target_loudness_db);

        if self.ready.load(Ordering::Acquire) {
            self.fade_out();
        }

        let (old_engine, old_bridge) = {
            let mut rt = self.rt.lock();
            let old_engine = rt.engine.replace(engine);
            let old_bridge = std::mem::replace(&mut rt.bridge, bridge);
            rt.ramp.mute();

            self.sample_rate_model.store(model_rate, Ordering::Release);
            self.needs_resample.store(needs_resample, Ordering::Release);
            self.phase_offset.store(phase_offset, Ordering::Release);
            self.norm_gain.store(gain, Ordering::Release);
            self.clear_pending.store(false, Ordering::Release);
            self.do_ramp_down.store(false, Ordering::Release);
            self.do_ramp.store(true, Ordering::Release);
            self.ready.store(true, Ordering::Release);
            (old_engine, old_bridge)
        };
        drop(old_engine);
        drop(old_bridge);

        Ok(metadata)
    }
}

impl<F: EngineFamily> Modeler for EngineAdapter<F> {
    fn set_model_file(&self, path: &Path) {
        *self.model_file.write() = path.to_path_buf();
    }

    fn model_file(&self) -> PathBuf {
        self.model_file.read().clone()
    }

    fn phase_offset(&self) -> u32 {
        self.phase_offset.load(Ordering::Acquire)
    }

    fn clear_state(&self) {
        self.clear_pending.store(true, Ordering::Release);
    }

    fn initialize(&self, sample_rate: u32) {
        self.sample_rate_host.store(sample_rate, Ordering::Release);
        StatCounters::bump(&self.stats.initializations);
        if self.release() {
            self.record_unload("released by initialize");
        }
        log::debug!("{} adapter initialized at {} Hz", F::NAME, sample_rate);
    }

    fn connect(&self, port: Port, control: Arc<AtomicF32>) {
        self.ports.write().bind(port, control);
    }

    fn normalize(&self, buffer: &mut [f32]) {
        if self.ready.load(Ordering::Acquire) {
            apply_gain(buffer, self.norm_gain.load(Ordering::Acquire));
        }
    }

    fn compute(&self, input: &[f32], output: &mut [f32]) {
        let count = input.len().min(output.len());
        if !self.ready.load(Ordering::Acquire) || count == 0 {
            write_idle(self.config.idle_output, input, output);
            return;
        }
        // Held only while publishing or releasing, both behind a muted ramp
        let Some(mut guard) = self.rt.try_lock() else {
            write_idle(self.config.idle_output, input, output);
            return;
        };
        let RtState {
            engine,
            bridge,
            ramp,
            scratch,
            port_db,
        } = &mut *guard;
        let Some(engine) = engine.as_mut() else {
            write_idle(self.config.idle_output, input, output);
            return;
        };

        if self.clear_pending.swap(false, Ordering::AcqRel) {
            engine.reset();
            if let Some(bridge) = bridge.as_mut() {
                bridge.reset();
            }
        }

        ramp.configure(count, self.sample_rate_host.load(Ordering::Relaxed));
        if self.do_ramp_down.load(Ordering::Acquire) {
            self.do_ramp.store(false, Ordering::Release);
            ramp.begin_ramp_down();
            if ramp.state() == RampState::Silent {
                self.finish_fade_out();
            }
        } else if self.do_ramp.load(Ordering::Acquire) {
            ramp.begin_ramp_in();
        }

        if let Some(ports) = self.ports.try_read() {
            *port_db = (ports.db(Port::InputGain), ports.db(Port::OutputGain));
        }
        let in_gain = db_to_linear(port_db.0);
        let out_gain = db_to_linear(port_db.1);
        let passthrough = self.config.idle_output == IdleOutput::Passthrough;
        let chunk = scratch.len();
        let mut event = RampEvent::None;

        for (src, dst) in input[..count]
            .chunks(chunk)
            .zip(output[..count].chunks_mut(chunk))
        {
            let staged = &mut scratch[..src.len()];
            staged.copy_from_slice(src);
            apply_gain(staged, in_gain);

            match bridge.as_mut() {
                Some(bridge) => bridge.process(staged, dst, |i, o| engine.process(i, o)),
                None => engine.process(staged, dst),
            }

            apply_gain(dst, out_gain);
            let faded = if passthrough {
                ramp.crossfade(dst, src)
            } else {
                ramp.apply(dst)
            };
            match faded {
                RampEvent::None => {}
                done => event = done,
            }
        }
        output[count..].fill(0.0);

        if output[..count].iter().any(|s| !s.is_finite()) {
            output.fill(0.0);
        }

        match event {
            RampEvent::FadedIn => self.do_ramp.store(false, Ordering::Release),
            RampEvent::FadedOut => self.finish_fade_out(),
            RampEvent::None => {}
        }
    }

    fn load_model(&self) -> Result<()> {
        if self.loading.swap(true, Ordering::AcqRel) {
            return Err(HotswapError::LoadInProgress);
        }
        let path = self.model_file();
        let result = {
            let _loading = LoadingGuard(&self.loading);
            self.load_from(&path)
        };

        match result {
            Ok(metadata) => {
                StatCounters::bump(&self.stats.loads);
                log::info!(
                    "Loaded {} model {} ({} Hz, phase offset {} samples{})",
                    F::NAME,
                    path.display(),
                    metadata.sample_rate,
                    self.phase_offset(),
                    if self.needs_resample() { ", resampled" } else { "" }
                );
                self.notifier.notify(LoadEvent::Loaded {
                    kind: F::KIND,
                    path,
                });
                Ok(())
            }
            Err(e) => {
                StatCounters::bump(&self.stats.failed_loads);
                log::warn!("Failed to load {} model: {}", F::NAME, e);
                self.notifier.notify(LoadEvent::Failed {
                    kind: F::KIND,
                    path,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn unload_model(&self) {
        if self.ready.load(Ordering::Acquire) {
            self.fade_out();
        }
        if self.release() {
            self.record_unload("unloaded");
        }
    }

    fn cleanup(&self) {
        if self.release() {
            self.record_unload("released");
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn needs_resample(&self) -> bool {
        self.needs_resample.load(Ordering::Acquire)
    }

    fn stats(&self) -> AdapterStats {
        self.stats.snapshot()
    }
}
