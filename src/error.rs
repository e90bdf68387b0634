//! Error handling for the hot-swap core
//!
//! Errors only ever surface on the control/loader thread. The audio path
//! never returns an error: anything that goes wrong there degrades to silence.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for hot-swap operations
pub type Result<T> = std::result::Result<T, HotswapError>;

/// Main error type for model loading and selection
#[derive(Error, Debug)]
pub enum HotswapError {
    // Load Errors
    #[error("Failed to load model {path}: {reason}")]
    LoadFailure {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported model file extension: {path}")]
    UnsupportedExtension { path: PathBuf },

    #[error("No model file configured")]
    NoModelFile,

    #[error("Model file not found: {path}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid model metadata in {path}: {reason}")]
    InvalidMetadata { path: PathBuf, reason: String },

    // Concurrency Errors
    #[error("A model load is already in progress")]
    LoadInProgress,

    #[error("Load worker has stopped")]
    WorkerStopped,

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HotswapError {
    /// Build a load failure without an underlying cause
    pub fn load_failure(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        HotswapError::LoadFailure {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            HotswapError::LoadFailure { .. } => "LOAD_FAILURE",
            HotswapError::UnsupportedExtension { .. } => "UNSUPPORTED_EXTENSION",
            HotswapError::NoModelFile => "NO_MODEL_FILE",
            HotswapError::FileNotFound { .. } => "FILE_NOT_FOUND",
            HotswapError::InvalidMetadata { .. } => "INVALID_METADATA",
            HotswapError::LoadInProgress => "LOAD_IN_PROGRESS",
            HotswapError::WorkerStopped => "WORKER_STOPPED",
            HotswapError::InvalidConfig { .. } => "INVALID_CONFIG",
            HotswapError::Io(_) => "IO_ERROR",
            HotswapError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Every load-side error leaves the previously active model running,
    /// so the session itself can always continue.
    pub fn is_recoverable(&self) -> bool {
        match self {
            HotswapError::WorkerStopped => false,
            HotswapError::InvalidConfig { .. } => false,
            _ => true,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            HotswapError::LoadFailure { .. } => vec![
                "The previous model is still active",
                "Check that the file was exported by a supported trainer",
                "Try re-exporting the model",
            ],
            HotswapError::UnsupportedExtension { .. } => vec![
                "Use a .nam file for NAM models",
                "Use a .json or .aidax file for RTNeural models",
            ],
            HotswapError::NoModelFile => vec!["Select a model file before loading"],
            HotswapError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            HotswapError::InvalidMetadata { .. } => vec![
                "The model file may be truncated or corrupted",
                "Check the sample rate field is a positive number",
            ],
            HotswapError::LoadInProgress => vec![
                "Wait for the current load to finish",
                "Queue requests through the load worker",
            ],
            HotswapError::InvalidConfig { .. } => vec![
                "Check the configuration file against the defaults",
                "Delete the configuration file to fall back to defaults",
            ],
            _ => vec![],
        }
    }
}
