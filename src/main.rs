//! hotswap-cli - Neural model hot-swap tools
//!
//! Command-line interface for the neural-hotswap core.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{debug, info};

use neural_hotswap::cli::commands::{self, RenderOptions};
use neural_hotswap::cli::{Cli, Commands};
use neural_hotswap::HotswapConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG still wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    debug!("hotswap-cli v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => HotswapConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => HotswapConfig::default(),
    };

    match cli.command {
        Some(cmd) => handle_command(cmd, config),
        None => {
            println!("hotswap-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: HotswapConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Classify { paths } => commands::classify(&paths)?,
        Commands::Scan { dir, json } => commands::scan(&dir, json)
            .with_context(|| format!("failed to scan {}", dir.display()))?,
        Commands::Render {
            input,
            output,
            model,
            swap_to,
            swap_at,
            block_size,
            normalize,
        } => {
            info!("Render using fade {} ms", config.fade_ms);
            let options = RenderOptions {
                input,
                output,
                model,
                swap_to,
                swap_at,
                block_size,
                normalize,
                config,
            };
            commands::render(&options).context("render failed")?
        }
    }
    Ok(())
}
