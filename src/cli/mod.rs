//! CLI Module
//!
//! Command-line interface for inspecting model files and rendering audio
//! through the hot-swap core offline.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Neural model hot-swap tools
#[derive(Parser, Debug)]
#[command(name = "hotswap-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print which engine handles each model file
    #[command(name = "classify")]
    Classify {
        /// Model files to classify
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List model files under a directory with their metadata
    #[command(name = "scan")]
    Scan {
        /// Directory to search
        dir: PathBuf,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a WAV file through the selector, optionally swapping models mid-stream
    #[command(name = "render")]
    Render {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file (mono, 32-bit float)
        #[arg(short, long)]
        output: PathBuf,

        /// Model loaded before the first block
        #[arg(short, long)]
        model: PathBuf,

        /// Model to swap to on the loader thread
        #[arg(long)]
        swap_to: Option<PathBuf>,

        /// Time of the swap request in seconds
        #[arg(long, default_value_t = 1.0)]
        swap_at: f64,

        /// Host block size in samples
        #[arg(short, long, default_value_t = 256)]
        block_size: usize,

        /// Apply model loudness normalization
        #[arg(long)]
        normalize: bool,
    },
}
