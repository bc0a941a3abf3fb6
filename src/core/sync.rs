//! Server-to-local synchronisation: fetch the manifest into a fresh snapshot
//! directory, then promote it into the live working set.
//!
//! A run moves through
//! `Idle -> Fetching -> {FetchFailed | Fetched} -> Promoting -> Promoted -> ReportingStats -> Done`.
//! Nothing in the live directory is written before `Promoting`, and
//! `FetchFailed` is terminal.

use crate::config::Config;
use crate::core::backup::{BackupLogic, SnapshotHandle, stamped_name};
use crate::core::lock::RunLock;
use crate::core::manifest::{Manifest, Requirement};
use crate::core::transport::{TransferFailure, Transport};
use crate::db::stats::{DatasetStatistics, compute_dataset_statistics};
use crate::errors::{AppError, AppResult};
use crate::utils::path::ensure_parent;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const BUNDLE_PREFIX: &str = "server_backup";
pub const BUNDLE_PATTERN: &str = "server_backup_*";
pub const REPORT_FILE_NAME: &str = "fetch_report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    Idle,
    Fetching,
    FetchFailed,
    Fetched,
    Promoting,
    Promoted,
    ReportingStats,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ArtifactStatus {
    Fetched { bytes: u64 },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactResult {
    pub name: String,
    pub remote_path: String,
    pub local_path: String,
    pub requirement: Requirement,
    pub status: ArtifactStatus,
}

impl ArtifactResult {
    pub fn is_fetched(&self) -> bool {
        matches!(self.status, ArtifactStatus::Fetched { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub source: String,
    pub snapshot_dir: PathBuf,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub artifacts: Vec<ArtifactResult>,
}

impl FetchReport {
    pub fn fetched(&self) -> impl Iterator<Item = &ArtifactResult> {
        self.artifacts.iter().filter(|a| a.is_fetched())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ArtifactResult> {
        self.artifacts.iter().filter(|a| !a.is_fetched())
    }

    pub fn total_bytes(&self) -> u64 {
        self.artifacts
            .iter()
            .map(|a| match a.status {
                ArtifactStatus::Fetched { bytes } => bytes,
                ArtifactStatus::Skipped { .. } => 0,
            })
            .sum()
    }

    /// One line per optional artifact that was not fetched.
    pub fn warnings(&self) -> Vec<String> {
        self.artifacts
            .iter()
            .filter_map(|a| match &a.status {
                ArtifactStatus::Skipped { reason } => Some(format!(
                    "optional artifact '{}' ({}) skipped: {}",
                    a.name, a.remote_path, reason
                )),
                ArtifactStatus::Fetched { .. } => None,
            })
            .collect()
    }
}

/// Transfer every manifest entry into `snapshot_dir/<local_path>`.
///
/// Optional entries that fail are recorded as skipped. The first required
/// entry that fails aborts the whole fetch: `RequiredArtifactMissing` when
/// the file is absent, `Transfer` for any other failure.
pub fn fetch_remote_set(
    transport: &dyn Transport,
    manifest: &Manifest,
    snapshot_dir: &Path,
) -> AppResult<FetchReport> {
    let started_at = Local::now();
    let mut artifacts = Vec::with_capacity(manifest.entries.len());

    for entry in manifest.iter() {
        let dest = snapshot_dir.join(&entry.local_path);
        tracing::debug!(artifact = %entry.name, remote = %entry.remote_path, "fetching");

        let status = match transport.fetch(&entry.remote_path, &dest) {
            Ok(bytes) => {
                tracing::info!(artifact = %entry.name, bytes, "fetched");
                ArtifactStatus::Fetched { bytes }
            }
            Err(failure) if entry.is_required() => {
                tracing::error!(artifact = %entry.name, error = %failure, "required artifact not fetched");
                return Err(match failure {
                    TransferFailure::NotFound => AppError::RequiredArtifactMissing {
                        artifact: entry.name.clone(),
                        remote: format!("{}/{}", transport.describe(), entry.remote_path),
                    },
                    TransferFailure::Failed(reason) => AppError::Transfer {
                        artifact: entry.name.clone(),
                        reason,
                    },
                });
            }
            Err(failure) => {
                tracing::warn!(artifact = %entry.name, error = %failure, "optional artifact skipped");
                ArtifactStatus::Skipped {
                    reason: failure.to_string(),
                }
            }
        };

        artifacts.push(ArtifactResult {
            name: entry.name.clone(),
            remote_path: entry.remote_path.clone(),
            local_path: entry.local_path.clone(),
            requirement: entry.requirement,
            status,
        });
    }

    Ok(FetchReport {
        source: transport.describe(),
        snapshot_dir: snapshot_dir.to_path_buf(),
        started_at,
        finished_at: Local::now(),
        artifacts,
    })
}

/// Copy every fetched artifact of `report` from `snapshot_dir` into
/// `live_dir`, replacing the previous live copy. Skipped artifacts keep their
/// current live file.
///
/// All files are first staged next to their destination; only when every
/// copy succeeded are they renamed into place.
pub fn promote_snapshot_to_live(
    snapshot_dir: &Path,
    live_dir: &Path,
    report: &FetchReport,
) -> AppResult<Vec<PathBuf>> {
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();

    for artifact in report.fetched() {
        let src = snapshot_dir.join(&artifact.local_path);
        let dest = live_dir.join(&artifact.local_path);
        let tmp = staging_path(&dest);

        let result = ensure_parent(&dest).and_then(|_| fs::copy(&src, &tmp));
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            for (tmp, _) in &staged {
                let _ = fs::remove_file(tmp);
            }
            return Err(std::io::Error::new(
                e.kind(),
                format!("cannot stage '{}' for promotion: {}", artifact.name, e),
            )
            .into());
        }
        staged.push((tmp, dest));
    }

    let mut promoted = Vec::with_capacity(staged.len());
    for (i, (tmp, dest)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp, dest) {
            for (rest, _) in &staged[i..] {
                let _ = fs::remove_file(rest);
            }
            tracing::warn!(path = %dest.display(), promoted = promoted.len(), error = %e, "promotion interrupted");
            return Err(std::io::Error::new(
                e.kind(),
                format!("cannot promote {}: {}", dest.display(), e),
            )
            .into());
        }
        tracing::info!(path = %dest.display(), "promoted");
        promoted.push(dest.clone());
    }

    Ok(promoted)
}

fn staging_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.attsync-tmp"))
}

#[derive(Debug, Serialize)]
pub struct SyncOutcome {
    pub snapshot_dir: PathBuf,
    pub report: FetchReport,
    pub pre_promotion_backup: Option<SnapshotHandle>,
    pub promoted: Vec<PathBuf>,
    pub stats: Option<DatasetStatistics>,
    pub warnings: Vec<String>,
    pub state: SyncState,
}

pub struct SyncOrchestrator<'a> {
    cfg: &'a Config,
    transport: Box<dyn Transport + 'a>,
    collect_stats: bool,
    state: SyncState,
    history: Vec<SyncState>,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(cfg: &'a Config, transport: Box<dyn Transport + 'a>) -> Self {
        Self {
            cfg,
            transport,
            collect_stats: true,
            state: SyncState::Idle,
            history: vec![SyncState::Idle],
        }
    }

    pub fn with_stats(mut self, collect: bool) -> Self {
        self.collect_stats = collect;
        self
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Every state the run went through, starting with `Idle`.
    pub fn history(&self) -> &[SyncState] {
        &self.history
    }

    fn transition(&mut self, next: SyncState) {
        tracing::debug!(from = ?self.state, to = ?next, "sync state");
        self.state = next;
        self.history.push(next);
    }

    /// Run one sync. `confirm` is asked once the fetch succeeded and before
    /// anything in the live directory changes; returning false cancels.
    pub fn run<F>(&mut self, mut confirm: F) -> AppResult<SyncOutcome>
    where
        F: FnMut(&FetchReport) -> AppResult<bool>,
    {
        self.cfg.manifest.validate()?;

        let live_dir = self.cfg.live_dir_path();
        let backup_dir = self.cfg.backup_dir_path();
        let _lock = RunLock::acquire(&live_dir, "sync")?;

        let snapshot_dir = prepare_snapshot_dir(&backup_dir)?;
        tracing::info!(dir = %snapshot_dir.display(), source = %self.transport.describe(), "sync started");

        self.transition(SyncState::Fetching);
        let report = match fetch_remote_set(self.transport.as_ref(), &self.cfg.manifest, &snapshot_dir)
        {
            Ok(r) => r,
            Err(e) => {
                self.transition(SyncState::FetchFailed);
                return Err(e);
            }
        };
        self.transition(SyncState::Fetched);

        let mut warnings = report.warnings();
        if let Err(e) = write_report(&snapshot_dir, &report) {
            warnings.push(format!("could not write {REPORT_FILE_NAME}: {e}"));
        }

        if !confirm(&report)? {
            return Err(AppError::Cancelled);
        }

        let primary = self.cfg.primary_file_path();
        let pre_promotion_backup = if primary.exists() {
            match BackupLogic::create_snapshot(&primary, &backup_dir) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "pre-promotion backup failed");
                    warnings.push(format!("backup of the current live database failed: {e}"));
                    None
                }
            }
        } else {
            None
        };

        self.transition(SyncState::Promoting);
        let promoted = promote_snapshot_to_live(&snapshot_dir, &live_dir, &report)?;
        self.transition(SyncState::Promoted);

        self.transition(SyncState::ReportingStats);
        let stats = self
            .collect_stats
            .then(|| compute_dataset_statistics(&primary, &self.cfg.stats));

        self.transition(SyncState::Done);

        Ok(SyncOutcome {
            snapshot_dir,
            report,
            pre_promotion_backup,
            promoted,
            stats,
            warnings,
            state: self.state,
        })
    }
}

/// Create `backups/server_backup_<stamp>/`, suffixing `_<n>` on collision.
fn prepare_snapshot_dir(backup_dir: &Path) -> AppResult<PathBuf> {
    let base = stamped_name(BUNDLE_PREFIX);
    let mut dir = backup_dir.join(&base);
    let mut n = 1;
    while dir.exists() {
        dir = backup_dir.join(format!("{base}_{n}"));
        n += 1;
    }

    fs::create_dir_all(&dir).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("cannot prepare snapshot directory {}: {}", dir.display(), e),
        )
    })?;
    Ok(dir)
}

fn write_report(snapshot_dir: &Path, report: &FetchReport) -> AppResult<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(snapshot_dir.join(REPORT_FILE_NAME), json)?;
    Ok(())
}
