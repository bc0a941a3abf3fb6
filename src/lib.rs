//! attsync library root.
//! Exposes the CLI parser, the high-level run() function and the
//! backup / retention / sync components.

pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod errors;
pub mod ui;
pub mod utils;

use clap::Parser;
use cli::parser::{Cli, Commands};
use config::Config;
use errors::AppResult;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Central command dispatcher
pub fn dispatch(cli: &Cli, cfg: &mut Config) -> AppResult<()> {
    match &cli.command {
        Commands::Init => cli::commands::init::handle(cli, cfg),
        Commands::Config { .. } => cli::commands::config::handle(&cli.command, cfg),
        Commands::Backup { .. } => cli::commands::backup::handle(&cli.command, cfg),
        Commands::Sweep { .. } => cli::commands::sweep::handle(&cli.command, cfg),
        Commands::Sync { .. } => cli::commands::sync::handle(cli, cfg),
        Commands::Stats => cli::commands::stats::handle(cfg),
        Commands::List => cli::commands::list::handle(cfg),
        Commands::Clean { .. } => cli::commands::clean::handle(cli, cfg),
        Commands::Bundle => cli::commands::bundle::handle(cfg),
    }
}

/// Diagnostics go to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "attsync=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Resolve the configuration: file, then environment, then command line.
pub fn load_config(cli: &Cli) -> AppResult<Config> {
    let path = config_path(cli);
    let mut cfg = Config::load_from(&path)?;
    cfg.apply_env()?;

    if let Some(dir) = &cli.live_dir {
        cfg.live_dir = dir.clone();
    }
    if let Some(dir) = &cli.backup_dir {
        cfg.backup_dir = dir.clone();
    }

    Ok(cfg)
}

pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .as_deref()
        .map(utils::path::expand_tilde)
        .unwrap_or_else(Config::config_file)
}

/// Entry point used by main.rs
pub fn run() -> AppResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut cfg = load_config(&cli)?;
    dispatch(&cli, &mut cfg)
}
