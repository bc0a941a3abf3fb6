use crate::cli::parser::Cli;
use crate::config::Config;
use crate::config_path;
use crate::errors::AppResult;
use crate::ui::messages::{info, success};
use std::fs;

/// Handle the `init` command
///
/// This initializes:
///  - the configuration file (left alone when it already exists)
///  - the backup directory
pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let path = config_path(cli);

    if Config::write_default(&path)? {
        success(format!("Config file: {}", path.display()));
    } else {
        info(format!("Config file already present: {}", path.display()));
    }

    let backups = cfg.backup_dir_path();
    fs::create_dir_all(&backups)?;
    success(format!("Backup directory: {}", backups.display()));

    info("Set 'remote_host' (or REMOTE_HOST) before running 'attsync sync'.");
    Ok(())
}
