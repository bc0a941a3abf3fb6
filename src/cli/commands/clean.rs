use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::core::clean::CleanLogic;
use crate::core::lock::RunLock;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{info, item, success, warning};
use crate::ui::prompt::confirm;

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    if let Commands::Clean { dry_run } = &cli.command {
        let live_dir = cfg.live_dir_path();
        let targets = CleanLogic::find_stray(&live_dir, &cfg.clean_patterns, &[cfg.backup_dir_path()])?;

        if targets.is_empty() {
            info(format!("No stray files in {}", live_dir.display()));
            return Ok(());
        }

        for path in &targets {
            item("•", path.display());
        }

        if *dry_run {
            info(format!("Dry run: {} stray item(s) would be removed", targets.len()));
            return Ok(());
        }

        if !confirm(&format!("Delete these {} item(s)?", targets.len()), cli.yes)? {
            return Err(AppError::Cancelled);
        }

        let _lock = RunLock::acquire(&live_dir, "clean")?;
        let report = CleanLogic::remove(&targets);
        for (path, reason) in &report.failed {
            warning(format!("Could not remove {}: {}", path.display(), reason));
        }
        success(format!("{} stray item(s) removed", report.removed.len()));
    }

    Ok(())
}
