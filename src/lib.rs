//! neural-hotswap - Real-time neural model hot-swapping
//!
//! Lets a host swap the neural model behind an audio effect while audio keeps
//! running:
//! - Models load on a control thread and are published without blocking audio
//! - Models trained at another sample rate run behind a resampling bridge
//! - Every swap fades the old model out and the new one in
//!
//! # Architecture
//!
//! - `modeler`: one adapter per engine family (NAM, RTNeural) behind a
//!   `ModelSelector` that routes calls by model file extension
//! - `dsp`: fade ramp, polyphase resampler, host/model rate bridge
//! - `neural`: inference engine traits, model metadata, mock engines
//! - `worker`: background loader thread

pub mod cli;
pub mod config;
pub mod dsp;
pub mod error;
pub mod modeler;
pub mod neural;
pub mod worker;

pub use config::{HotswapConfig, IdleOutput};
pub use error::{HotswapError, Result};
pub use modeler::{
    AdapterStats, EngineKind, LoadEvent, LoadNotifier, Modeler, ModelSelector, ModelerSwitch,
    Port,
};
pub use worker::{LoadWorker, WorkerEvent};
