//! Backup/retention: timestamped gzip snapshots and the age-based sweep.

use crate::errors::{AppError, AppResult};
use crate::utils::time::{now_stamp, stamp_of};
use chrono::{DateTime, Local};
use flate2::Compression;
use flate2::write::GzEncoder;
use glob::Pattern;
use serde::Serialize;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const SECS_PER_DAY: u64 = 86_400;

/// Result of a successful `create_snapshot`.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotHandle {
    pub path: PathBuf,
    pub source_bytes: u64,
    pub compressed_bytes: u64,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub kept: usize,
}

impl SweepReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

pub struct BackupLogic;

impl BackupLogic {
    /// Copy `source` into `dest_dir` as `<stem>_<YYYYMMDD_HHMMSS>.<ext>` and
    /// gzip it in place. The uncompressed copy never survives: on success it is
    /// replaced by the `.gz`, on failure both files are removed.
    pub fn create_snapshot(source: &Path, dest_dir: &Path) -> AppResult<SnapshotHandle> {
        snapshot_with(source, dest_dir, compress_file)
    }

    /// Remove every entry of `dir` matching `pattern` whose last-modified time
    /// is more than `max_age_days` days in the past.
    pub fn sweep_expired(dir: &Path, pattern: &str, max_age_days: u32) -> AppResult<SweepReport> {
        Self::sweep_expired_at(dir, pattern, max_age_days, SystemTime::now(), false)
    }

    /// Same as `sweep_expired` with an explicit clock. With `dry_run` the
    /// expired entries are reported in `removed` but left on disk.
    pub fn sweep_expired_at(
        dir: &Path,
        pattern: &str,
        max_age_days: u32,
        now: SystemTime,
        dry_run: bool,
    ) -> AppResult<SweepReport> {
        sweep_with(dir, pattern, max_age_days, now, dry_run, remove_entry)
    }

    /// Number of entries in `dir` matching `pattern`.
    pub fn count_snapshots(dir: &Path, pattern: &str) -> AppResult<usize> {
        let matcher = compile_pattern(pattern)?;
        Ok(matching_entries(dir, &matcher)?.len())
    }
}

fn snapshot_with<C>(source: &Path, dest_dir: &Path, compress: C) -> AppResult<SnapshotHandle>
where
    C: FnOnce(&Path, &Path) -> io::Result<u64>,
{
    let meta = fs::metadata(source).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Source file not available: {} ({})", source.display(), e),
        )
    })?;
    if !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Source is not a regular file: {}", source.display()),
        )
        .into());
    }

    fs::create_dir_all(dest_dir).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Cannot create backup directory {}: {}", dest_dir.display(), e),
        )
    })?;

    let created_at = Local::now();
    let plain = unique_snapshot_path(source, dest_dir, &stamp_of(&created_at));

    let source_bytes = fs::copy(source, &plain)?;
    tracing::debug!(src = %source.display(), copy = %plain.display(), source_bytes, "snapshot copied");

    let gz = gz_path(&plain);
    let compressed_bytes = match compress(&plain, &gz) {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = fs::remove_file(&gz);
            let _ = fs::remove_file(&plain);
            return Err(AppError::Compression {
                path: plain.display().to_string(),
                reason: e.to_string(),
            });
        }
    };

    fs::remove_file(&plain)?;
    tracing::info!(snapshot = %gz.display(), source_bytes, compressed_bytes, "snapshot created");

    Ok(SnapshotHandle {
        path: gz,
        source_bytes,
        compressed_bytes,
        created_at,
    })
}

fn sweep_with<R>(
    dir: &Path,
    pattern: &str,
    max_age_days: u32,
    now: SystemTime,
    dry_run: bool,
    mut remove: R,
) -> AppResult<SweepReport>
where
    R: FnMut(&Path) -> io::Result<()>,
{
    let matcher = compile_pattern(pattern)?;
    let max_age = Duration::from_secs(u64::from(max_age_days) * SECS_PER_DAY);
    let mut report = SweepReport::default();

    for path in matching_entries(dir, &matcher)? {
        let modified = match fs::symlink_metadata(&path).and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read modification time");
                report.failed.push((path, e.to_string()));
                continue;
            }
        };

        // Entries with a future mtime have age zero.
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age <= max_age {
            report.kept += 1;
            continue;
        }

        if dry_run {
            report.removed.push(path);
            continue;
        }

        match remove(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), age_days = age.as_secs() / SECS_PER_DAY, "expired snapshot removed");
                report.removed.push(path);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove expired snapshot");
                report.failed.push((path, e.to_string()));
            }
        }
    }

    Ok(report)
}

fn compile_pattern(pattern: &str) -> AppResult<Pattern> {
    Pattern::new(pattern)
        .map_err(|e| AppError::Config(format!("invalid snapshot pattern '{pattern}': {e}")))
}

/// Direct children of `dir` whose file name matches. A missing directory
/// yields an empty list.
pub(crate) fn matching_entries(dir: &Path, matcher: &Pattern) -> AppResult<Vec<PathBuf>> {
    let read = match fs::read_dir(dir) {
        Ok(r) => r,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut out = Vec::new();
    for entry in read {
        let entry = entry?;
        let name = entry.file_name();
        if matcher.matches(&name.to_string_lossy()) {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}

fn remove_entry(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// `<stem>_<stamp>.<ext>`, with `_<n>` added to the stamp when a snapshot
/// from the same second already exists.
fn unique_snapshot_path(source: &Path, dest_dir: &Path, stamp: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "snapshot".to_string());
    let ext = source.extension().map(|e| e.to_string_lossy().to_string());

    let build = |suffix: &str| {
        let name = match &ext {
            Some(ext) => format!("{stem}_{stamp}{suffix}.{ext}"),
            None => format!("{stem}_{stamp}{suffix}"),
        };
        dest_dir.join(name)
    };

    let mut candidate = build("");
    let mut n = 1;
    while candidate.exists() || gz_path(&candidate).exists() {
        candidate = build(&format!("_{n}"));
        n += 1;
    }
    candidate
}

fn gz_path(plain: &Path) -> PathBuf {
    let mut name = plain.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip `src` into `dest`, returning the compressed size.
fn compress_file(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut reader = BufReader::new(fs::File::open(src)?);
    let out = fs::File::create(dest)?;
    let mut encoder = GzEncoder::new(BufWriter::new(out), Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    let mut writer = encoder.finish()?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| e.into_error())?
        .sync_all()?;
    Ok(fs::metadata(dest)?.len())
}

/// Timestamped name for a new snapshot of any kind, e.g. `server_backup_<stamp>`.
pub fn stamped_name(prefix: &str) -> String {
    format!("{}_{}", prefix, now_stamp())
}
