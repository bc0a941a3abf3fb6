use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::backup::BackupLogic;
use crate::core::bundle::BUNDLE_ARCHIVE_PREFIX;
use crate::core::sync::BUNDLE_PATTERN;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{info, item, success, warning};
use std::time::SystemTime;

/// Patterns swept when none is given on the command line.
pub fn default_patterns(cfg: &Config) -> Vec<String> {
    vec![
        cfg.snapshot_pattern(),
        BUNDLE_PATTERN.to_string(),
        format!("{BUNDLE_ARCHIVE_PREFIX}_*.tar.gz"),
    ]
}

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Sweep {
        days,
        pattern,
        dry_run,
    } = cmd
    {
        let days = days.unwrap_or(cfg.retention_days);
        if days == 0 {
            return Err(AppError::Config("retention window must be at least 1 day".into()));
        }

        let dir = cfg.backup_dir_path();
        let patterns = match pattern {
            Some(p) => vec![p.clone()],
            None => default_patterns(cfg),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        let mut kept = 0;
        for p in &patterns {
            let report = BackupLogic::sweep_expired_at(&dir, p, days, now, *dry_run)?;
            for path in &report.removed {
                if *dry_run {
                    item("•", format!("Would remove {}", path.display()));
                } else {
                    item("🗑️", format!("Removed {}", path.display()));
                }
            }
            for (path, reason) in &report.failed {
                warning(format!("Could not remove {}: {}", path.display(), reason));
            }
            removed += report.removed_count();
            kept += report.kept;
        }

        if *dry_run {
            info(format!(
                "Dry run: {} of {} snapshot(s) older than {} days",
                removed,
                removed + kept,
                days
            ));
        } else {
            success(format!(
                "{} expired snapshot(s) removed, {} kept (retention {} days)",
                removed, kept, days
            ));
        }
    }

    Ok(())
}
