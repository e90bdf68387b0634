//! Neural model interfaces
//!
//! This module provides:
//! - `InferenceEngine` / `EngineLoader` traits the adapters drive
//! - Metadata resolution for `.nam` and RTNeural model files
//! - Mock implementations for testing

pub mod metadata;
mod mock;
mod model;

pub use metadata::{read_nam_metadata, read_rtneural_metadata};
pub use mock::{MockEngine, MockLoader};
pub use model::{EngineLoader, InferenceEngine, ModelMetadata, DEFAULT_MODEL_SAMPLE_RATE};
