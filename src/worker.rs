//! Background model loading
//!
//! Model construction reads files and allocates, so it never runs on the
//! audio thread. `LoadWorker` owns a dedicated thread that applies load and
//! unload requests to a shared `ModelSelector` and reports the outcome on
//! an event channel.
//!
//! Load requests that pile up while a load is running are coalesced: only
//! the most recent path is loaded. The event channel holds at most
//! `EVENT_CAPACITY` undrained outcomes; newer ones are dropped with a
//! warning until the owner catches up.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::Serialize;

use crate::error::{HotswapError, Result};
use crate::modeler::{EngineKind, ModelSelector, ModelerSwitch};

/// Name of the loader thread
pub const WORKER_THREAD_NAME: &str = "hotswap-loader";

/// Undrained events kept before new ones are dropped
pub const EVENT_CAPACITY: usize = 64;

/// Request sent to the loader thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    /// Select this file and load it
    Load(PathBuf),
    /// Fade out and release the active model
    Unload,
    Shutdown,
}

/// Outcome reported by the loader thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerEvent {
    Loaded {
        path: PathBuf,
        kind: EngineKind,
        phase_offset: u32,
        needs_resample: bool,
        switch: ModelerSwitch,
    },
    Failed {
        path: PathBuf,
        error: String,
        code: &'static str,
    },
    Unloaded,
}

/// Handle to the loader thread
///
/// Dropping the handle stops the thread and waits for it.
pub struct LoadWorker {
    requests: Sender<LoadRequest>,
    events: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
}

impl LoadWorker {
    /// Start the loader thread for `selector`
    pub fn spawn(selector: Arc<ModelSelector>) -> Result<Self> {
        let (request_tx, request_rx) = unbounded();
        let (event_tx, event_rx) = bounded(EVENT_CAPACITY);

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run(&selector, &request_rx, &event_tx))?;

        log::debug!("Started {} thread", WORKER_THREAD_NAME);
        Ok(Self {
            requests: request_tx,
            events: event_rx,
            handle: Some(handle),
        })
    }

    /// Queue a model file for loading
    pub fn request_load(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.send(LoadRequest::Load(path.into()))
    }

    /// Queue an unload of the active model
    pub fn request_unload(&self) -> Result<()> {
        self.send(LoadRequest::Unload)
    }

    /// Receiver for load outcomes
    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// Wait up to `timeout` for the next outcome
    pub fn next_event(&self, timeout: Duration) -> Result<Option<WorkerEvent>> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(HotswapError::WorkerStopped),
        }
    }

    /// Stop the thread after the requests already queued
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn send(&self, request: LoadRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| HotswapError::WorkerStopped)
    }

    fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        // The thread may already be gone; joining still reports a panic
        let _ = self.requests.send(LoadRequest::Shutdown);
        handle.join().map_err(|_| HotswapError::WorkerStopped)?;
        log::debug!("Stopped {} thread", WORKER_THREAD_NAME);
        Ok(())
    }
}

impl Drop for LoadWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Loader thread ended abnormally: {}", e);
        }
    }
}

fn run(selector: &ModelSelector, requests: &Receiver<LoadRequest>, events: &Sender<WorkerEvent>) {
    let mut deferred = None;
    loop {
        let request = match deferred.take() {
            Some(request) => request,
            None => match requests.recv() {
                Ok(request) => request,
                Err(_) => break,
            },
        };

        let event = match request {
            LoadRequest::Load(mut path) => {
                while let Ok(next) = requests.try_recv() {
                    match next {
                        LoadRequest::Load(newer) => {
                            log::debug!("Skipping superseded load of {}", path.display());
                            path = newer;
                        }
                        other => {
                            deferred = Some(other);
                            break;
                        }
                    }
                }
                load(selector, path)
            }
            LoadRequest::Unload => {
                selector.unload_model();
                WorkerEvent::Unloaded
            }
            LoadRequest::Shutdown => break,
        };

        // Nobody listening is fine; the selector state is what matters
        if let Err(TrySendError::Full(event)) = events.try_send(event) {
            log::warn!("Event queue full, dropping {:?}", event);
        }
    }
}

fn load(selector: &ModelSelector, path: PathBuf) -> WorkerEvent {
    let switch = selector.set_model_file(&path);
    match selector.load_model() {
        Ok(()) => WorkerEvent::Loaded {
            kind: selector.active_kind(),
            phase_offset: selector.phase_offset(),
            needs_resample: selector.needs_resample(),
            switch,
            path,
        },
        Err(e) => WorkerEvent::Failed {
            code: e.error_code(),
            error: e.to_string(),
            path,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HotswapConfig;
    use crate::neural::MockLoader;

    fn worker() -> LoadWorker {
        let selector = Arc::new(ModelSelector::new(
            HotswapConfig::default(),
            Arc::new(MockLoader::identity()),
            Arc::new(MockLoader::identity()),
        ));
        LoadWorker::spawn(selector).unwrap()
    }

    #[test]
    fn test_failed_load_reports_code() {
        let worker = worker();
        worker.request_load("missing.wav").unwrap();
        let event = worker.next_event(Duration::from_secs(5)).unwrap();
        match event {
            Some(WorkerEvent::Failed { code, .. }) => assert_eq!(code, "UNSUPPORTED_EXTENSION"),
            other => panic!("unexpected event: {:?}", other),
        }
        worker.shutdown().unwrap();
    }

    #[test]
    fn test_unload_reports_event() {
        let worker = worker();
        worker.request_unload().unwrap();
        assert_eq!(
            worker.next_event(Duration::from_secs(5)).unwrap(),
            Some(WorkerEvent::Unloaded)
        );
    }

    #[test]
    fn test_undrained_events_are_capped() {
        let mut worker = worker();
        for _ in 0..EVENT_CAPACITY + 10 {
            worker.request_unload().unwrap();
        }
        worker.stop().unwrap();

        assert_eq!(worker.events().len(), EVENT_CAPACITY);
        assert_eq!(
            worker.next_event(Duration::from_millis(5)).unwrap(),
            Some(WorkerEvent::Unloaded)
        );
    }

    #[test]
    fn test_no_event_times_out() {
        let worker = worker();
        assert_eq!(worker.next_event(Duration::from_millis(5)).unwrap(), None);
    }
}
