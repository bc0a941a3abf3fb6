use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::core::backup::BackupLogic;
use crate::core::sync::{BUNDLE_PATTERN, FetchReport, SyncOrchestrator};
use crate::core::transport;
use crate::db::stats::print_statistics;
use crate::errors::AppResult;
use crate::ui::messages::{header, info, item, success, warning};
use crate::ui::prompt::confirm;
use crate::utils::human_bytes;

pub fn handle(cli: &Cli, cfg: &mut Config) -> AppResult<()> {
    if let Commands::Sync {
        remote,
        remote_path,
        no_stats,
    } = &cli.command
    {
        if let Some(target) = remote {
            cfg.set_remote_target(target);
        }
        if let Some(path) = remote_path {
            cfg.remote_path = path.clone();
        }
        cfg.validate()?;

        let live_dir = cfg.live_dir_path();
        let transport = transport::from_config(cfg)?;
        header(format!("Sync from {}", transport.describe()));

        let mut orchestrator = SyncOrchestrator::new(cfg, transport).with_stats(!*no_stats);
        let outcome = orchestrator.run(|report| {
            print_fetch_summary(report);
            confirm(
                &format!(
                    "Replace the live data in {} with this snapshot?",
                    live_dir.display()
                ),
                cli.yes,
            )
        })?;

        if let Some(backup) = &outcome.pre_promotion_backup {
            info(format!("Previous live database saved as {}", backup.path.display()));
        }
        for path in &outcome.promoted {
            item("↳", path.display());
        }
        for w in &outcome.warnings {
            warning(w);
        }
        success(format!(
            "{} file(s) promoted from {}",
            outcome.promoted.len(),
            outcome.snapshot_dir.display()
        ));

        if let Some(stats) = &outcome.stats {
            header("Dataset");
            print_statistics(&cfg.primary_file_path(), stats);
        }

        // Old sync bundles follow the same retention window as file snapshots.
        match BackupLogic::sweep_expired(&cfg.backup_dir_path(), BUNDLE_PATTERN, cfg.retention_days) {
            Ok(report) if report.removed_count() > 0 => info(format!(
                "{} expired sync snapshot(s) removed",
                report.removed_count()
            )),
            Ok(_) => {}
            Err(e) => warning(format!("Retention sweep failed: {e}")),
        }
    }

    Ok(())
}

fn print_fetch_summary(report: &FetchReport) {
    for a in report.fetched() {
        item("✔", format!("{:<14} {}", a.name, a.local_path));
    }
    for a in report.skipped() {
        item("–", format!("{:<14} {} (not fetched)", a.name, a.local_path));
    }
    info(format!(
        "Fetched {} of {} file(s), {} into {}",
        report.fetched().count(),
        report.artifacts.len(),
        human_bytes(report.total_bytes()),
        report.snapshot_dir.display()
    ));
}
