//! Hot-swap configuration
//!
//! Settings shared by every adapter owned by a `ModelSelector`. Loaded from
//! JSON; every field has a default so partial files are accepted.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HotswapError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default fade length in milliseconds
pub const DEFAULT_FADE_MS: f32 = 20.0;

/// Default upper bound on the teardown wait
pub const DEFAULT_FADE_TIMEOUT_MS: u64 = 200;

/// Default size of the pre-allocated scratch buffers
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 4096;

/// Default normalization target for models that report their loudness
pub const DEFAULT_TARGET_LOUDNESS_DB: f32 = -18.0;

/// Largest scratch allocation accepted from a config file
const MAX_BLOCK_SIZE_LIMIT: usize = 1 << 16;

/// What `compute` writes while no model is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleOutput {
    /// Output block is zeroed
    #[default]
    Silence,
    /// Input is copied to the output unchanged; fades crossfade between
    /// the dry input and the model instead of through silence
    Passthrough,
}

/// Configuration for the hot-swap core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotswapConfig {
    /// Approximate fade-in/fade-out duration; rounded up to whole host blocks
    pub fade_ms: f32,

    /// How long the control thread waits for a fade-out before tearing down anyway
    pub fade_timeout_ms: u64,

    /// Scratch buffer size; larger host blocks are processed in chunks
    pub max_block_size: usize,

    /// Output while no model is loaded
    pub idle_output: IdleOutput,

    /// Loudness that `normalize` brings models to, in dB
    pub target_loudness_db: f32,
}

impl Default for HotswapConfig {
    fn default() -> Self {
        Self {
            fade_ms: DEFAULT_FADE_MS,
            fade_timeout_ms: DEFAULT_FADE_TIMEOUT_MS,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            idle_output: IdleOutput::default(),
            target_loudness_db: DEFAULT_TARGET_LOUDNESS_DB,
        }
    }
}

impl HotswapConfig {
    /// Read and validate a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| HotswapError::FileNotFound {
            path: path.to_path_buf(),
            source: Some(e),
        })?;
        let config: HotswapConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check that all values are usable
    pub fn validate(&self) -> Result<()> {
        if !self.fade_ms.is_finite() || self.fade_ms <= 0.0 {
            return Err(HotswapError::InvalidConfig {
                reason: format!("fade_ms must be positive, got {}", self.fade_ms),
            });
        }
        if self.fade_timeout_ms == 0 {
            return Err(HotswapError::InvalidConfig {
                reason: "fade_timeout_ms must be non-zero".to_string(),
            });
        }
        if self.max_block_size == 0 || self.max_block_size > MAX_BLOCK_SIZE_LIMIT {
            return Err(HotswapError::InvalidConfig {
                reason: format!(
                    "max_block_size must be in 1..={}, got {}",
                    MAX_BLOCK_SIZE_LIMIT, self.max_block_size
                ),
            });
        }
        if !self.target_loudness_db.is_finite() {
            return Err(HotswapError::InvalidConfig {
                reason: "target_loudness_db must be finite".to_string(),
            });
        }
        Ok(())
    }

    /// Teardown wait bound as a `Duration`
    pub fn fade_timeout(&self) -> Duration {
        Duration::from_millis(self.fade_timeout_ms)
    }
}
