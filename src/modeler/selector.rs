//! Model selector
//!
//! Owns one adapter per engine family plus `NoModel`, and routes every call
//! to the active one. The active modeler changes only when a model file of
//! a different family is selected; unrecognized extensions leave it alone.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;
use parking_lot::Mutex;
use serde::Serialize;

use super::sync::LoadNotifier;
use super::{
    AdapterStats, EngineKind, Modeler, NamModeler, NoModel, Port, PortBindings, RtNeuralModeler,
};
use crate::config::HotswapConfig;
use crate::error::Result;
use crate::neural::EngineLoader;

/// Result of `ModelSelector::set_model_file`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelerSwitch {
    /// Same family (or unrecognized extension); the path was forwarded
    Unchanged,
    /// The previous modeler was unloaded and a new one initialized
    Switched { from: EngineKind, to: EngineKind },
}

impl ModelerSwitch {
    pub fn is_switch(&self) -> bool {
        matches!(self, ModelerSwitch::Switched { .. })
    }
}

/// Bind the active modeler as `$m` and evaluate `$body`
macro_rules! with_modeler {
    ($self:ident, $m:ident => $body:expr) => {
        match $self.active_kind() {
            EngineKind::None => {
                let $m = &$self.none;
                $body
            }
            EngineKind::Nam => {
                let $m = &$self.nam;
                $body
            }
            EngineKind::RtNeural => {
                let $m = &$self.rtneural;
                $body
            }
        }
    };
}

/// Routes host calls to the modeler matching the current model file
///
/// Share it as `Arc<ModelSelector>` between the audio thread (`compute`,
/// `normalize`) and control threads (everything else).
pub struct ModelSelector {
    config: HotswapConfig,
    active: AtomicU8,
    sample_rate: AtomicU32,
    none: NoModel,
    nam: NamModeler,
    rtneural: RtNeuralModeler,
    ports: Mutex<PortBindings>,
    /// Serializes family switches
    switching: Mutex<()>,
    notifier: Arc<LoadNotifier>,
}

impl ModelSelector {
    pub fn new(
        config: HotswapConfig,
        nam_loader: Arc<dyn EngineLoader>,
        rtneural_loader: Arc<dyn EngineLoader>,
    ) -> Self {
        Self::with_notifier(
            config,
            nam_loader,
            rtneural_loader,
            Arc::new(LoadNotifier::new()),
        )
    }

    /// Like `new`, reporting load events to an existing notifier
    pub fn with_notifier(
        config: HotswapConfig,
        nam_loader: Arc<dyn EngineLoader>,
        rtneural_loader: Arc<dyn EngineLoader>,
        notifier: Arc<LoadNotifier>,
    ) -> Self {
        Self {
            none: NoModel::new(config.idle_output),
            nam: NamModeler::new(nam_loader, &config, Arc::clone(&notifier)),
            rtneural: RtNeuralModeler::new(rtneural_loader, &config, Arc::clone(&notifier)),
            config,
            active: AtomicU8::new(EngineKind::None as u8),
            sample_rate: AtomicU32::new(0),
            ports: Mutex::new(PortBindings::default()),
            switching: Mutex::new(()),
            notifier,
        }
    }

    /// Which modeler currently receives calls
    pub fn active_kind(&self) -> EngineKind {
        EngineKind::from_u8(self.active.load(Ordering::Acquire))
    }

    /// Select a model file, switching modelers if its family differs
    ///
    /// On a switch the outgoing adapter fades out and unloads, the incoming
    /// one is initialized at the stored host rate and receives every bound
    /// port. The path is then forwarded to whichever modeler is active.
    pub fn set_model_file(&self, path: &Path) -> ModelerSwitch {
        let _switching = self.switching.lock();
        let from = self.active_kind();

        let switch = match EngineKind::classify(path) {
            Some(to) if to != from => {
                with_modeler!(self, m => m.unload_model());
                self.active.store(to as u8, Ordering::Release);

                let sample_rate = self.sample_rate.load(Ordering::Acquire);
                let ports = self.ports.lock();
                with_modeler!(self, m => {
                    m.initialize(sample_rate);
                    for (port, control) in ports.iter() {
                        m.connect(port, Arc::clone(control));
                    }
                });
                log::info!("Switched modeler {} -> {}", from, to);
                ModelerSwitch::Switched { from, to }
            }
            Some(_) => ModelerSwitch::Unchanged,
            None => {
                log::debug!(
                    "Unrecognized model extension {}, keeping {} modeler",
                    path.display(),
                    from
                );
                ModelerSwitch::Unchanged
            }
        };

        with_modeler!(self, m => m.set_model_file(path));
        switch
    }

    pub fn model_file(&self) -> PathBuf {
        with_modeler!(self, m => m.model_file())
    }

    /// Store the host rate and initialize the active modeler
    pub fn initialize(&self, sample_rate: u32) {
        let _switching = self.switching.lock();
        self.sample_rate.store(sample_rate, Ordering::Release);
        with_modeler!(self, m => m.initialize(sample_rate));
    }

    /// Host rate from the last `initialize`; 0 before that
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    pub fn clear_state(&self) {
        with_modeler!(self, m => m.clear_state());
    }

    /// Bind a port on the active modeler and remember it for later switches
    pub fn connect(&self, port: Port, control: Arc<AtomicF32>) {
        self.ports.lock().bind(port, Arc::clone(&control));
        with_modeler!(self, m => m.connect(port, control));
    }

    pub fn normalize(&self, buffer: &mut [f32]) {
        with_modeler!(self, m => m.normalize(buffer));
    }

    pub fn compute(&self, input: &[f32], output: &mut [f32]) {
        with_modeler!(self, m => m.compute(input, output));
    }

    pub fn load_model(&self) -> Result<()> {
        with_modeler!(self, m => m.load_model())
    }

    pub fn phase_offset(&self) -> u32 {
        with_modeler!(self, m => m.phase_offset())
    }

    pub fn unload_model(&self) {
        with_modeler!(self, m => m.unload_model());
    }

    pub fn cleanup(&self) {
        with_modeler!(self, m => m.cleanup());
    }

    pub fn is_ready(&self) -> bool {
        with_modeler!(self, m => m.is_ready())
    }

    pub fn needs_resample(&self) -> bool {
        with_modeler!(self, m => m.needs_resample())
    }

    /// Lifecycle counters of one family's adapter
    pub fn stats(&self, kind: EngineKind) -> AdapterStats {
        match kind {
            EngineKind::None => self.none.stats(),
            EngineKind::Nam => self.nam.stats(),
            EngineKind::RtNeural => self.rtneural.stats(),
        }
    }

    /// Events from every adapter
    pub fn notifier(&self) -> &Arc<LoadNotifier> {
        &self.notifier
    }

    pub fn config(&self) -> &HotswapConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural::MockLoader;

    fn selector() -> ModelSelector {
        let config = HotswapConfig {
            fade_timeout_ms: 10,
            ..HotswapConfig::default()
        };
        ModelSelector::new(
            config,
            Arc::new(MockLoader::identity()),
            Arc::new(MockLoader::identity()),
        )
    }

    #[test]
    fn test_starts_with_no_model() {
        let selector = selector();
        assert_eq!(selector.active_kind(), EngineKind::None);
        assert!(!selector.is_ready());
        assert_eq!(selector.phase_offset(), 0);
    }

    #[test]
    fn test_unrecognized_first_file_stays_on_no_model() {
        let selector = selector();
        let switch = selector.set_model_file(Path::new("amp.wav"));
        assert_eq!(switch, ModelerSwitch::Unchanged);
        assert_eq!(selector.active_kind(), EngineKind::None);
        assert_eq!(selector.model_file(), PathBuf::from("amp.wav"));
        assert_eq!(
            selector.load_model().unwrap_err().error_code(),
            "UNSUPPORTED_EXTENSION"
        );
    }

    #[test]
    fn test_switch_initializes_with_stored_rate() {
        let selector = selector();
        selector.initialize(44100);
        let switch = selector.set_model_file(Path::new("amp.nam"));
        assert_eq!(
            switch,
            ModelerSwitch::Switched {
                from: EngineKind::None,
                to: EngineKind::Nam
            }
        );
        assert_eq!(selector.nam.host_sample_rate(), 44100);
        assert_eq!(selector.stats(EngineKind::Nam).initializations, 1);
        assert_eq!(selector.model_file(), PathBuf::from("amp.nam"));
    }

    #[test]
    fn test_ports_follow_switches() {
        let selector = selector();
        let gain = Arc::new(AtomicF32::new(-3.0));
        selector.connect(Port::OutputGain, Arc::clone(&gain));
        selector.set_model_file(Path::new("amp.nam"));
        selector.set_model_file(Path::new("amp.json"));
        assert_eq!(selector.ports.lock().db(Port::OutputGain), -3.0);
    }
}
