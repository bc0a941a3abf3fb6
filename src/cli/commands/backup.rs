use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::backup::BackupLogic;
use crate::core::lock::RunLock;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{info, item, success, warning};
use crate::utils::human_bytes;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Backup { no_sweep, days } = cmd {
        let days = days.unwrap_or(cfg.retention_days);
        if !*no_sweep && days == 0 {
            return Err(AppError::Config("retention window must be at least 1 day".into()));
        }

        let _lock = RunLock::acquire(&cfg.live_dir_path(), "backup")?;

        let src = cfg.primary_file_path();
        let dest = cfg.backup_dir_path();
        let pattern = cfg.snapshot_pattern();

        info(format!("Backing up {}", src.display()));
        let handle = BackupLogic::create_snapshot(&src, &dest)?;
        success(format!(
            "Backup created: {} ({} → {})",
            handle.path.display(),
            human_bytes(handle.source_bytes),
            human_bytes(handle.compressed_bytes)
        ));

        if !*no_sweep {
            let report = BackupLogic::sweep_expired(&dest, &pattern, days)?;
            for path in &report.removed {
                item("🗑️", format!("Removed {}", path.display()));
            }
            for (path, reason) in &report.failed {
                warning(format!("Could not remove {}: {}", path.display(), reason));
            }
            info(format!(
                "Retention {} days: {} expired snapshot(s) removed",
                days,
                report.removed_count()
            ));
        }

        let remaining = BackupLogic::count_snapshots(&dest, &pattern)?;
        info(format!("{} snapshot(s) in {}", remaining, dest.display()));
    }

    Ok(())
}
