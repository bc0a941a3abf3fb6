//! Advisory lock guarding the live directory against overlapping runs
//! (e.g. a cron-triggered backup racing a manual sync).

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const LOCK_FILE_NAME: &str = ".attsync.lock";

/// Locks older than this are considered abandoned when the owner's
/// liveness cannot be checked.
const LOCK_STALE_SECONDS: i64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    created_at: String,
    operation: String,
}

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    released: bool,
}

impl RunLock {
    pub fn acquire(live_dir: &Path, operation: &str) -> AppResult<Self> {
        fs::create_dir_all(live_dir)?;
        let path = live_dir.join(LOCK_FILE_NAME);

        if path.exists() {
            let contents = fs::read_to_string(&path).unwrap_or_default();
            match serde_json::from_str::<LockInfo>(&contents) {
                Ok(info) if !is_stale(&info) => return Err(held_by(&info, &path)),
                Ok(info) => {
                    tracing::warn!(pid = info.pid, operation = %info.operation, "replacing stale lock");
                    set_aside(&path, &contents, "stale")?;
                }
                Err(_) => {
                    tracing::warn!(path = %path.display(), "replacing unreadable lock file");
                    set_aside(&path, &contents, "corrupt")?;
                }
            }
        }

        let info = LockInfo {
            pid: std::process::id(),
            created_at: Utc::now().to_rfc3339(),
            operation: operation.to_string(),
        };

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    AppError::Locked(format!("{} was created concurrently", path.display()))
                } else {
                    AppError::Io(e)
                }
            })?;
        file.write_all(serde_json::to_string(&info)?.as_bytes())?;
        file.sync_all()?;
        tracing::debug!(path = %path.display(), operation, "lock acquired");

        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn release(mut self) -> AppResult<()> {
        self.release_inner()?;
        Ok(())
    }

    fn release_inner(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.release_inner();
    }
}

fn held_by(info: &LockInfo, path: &Path) -> AppError {
    AppError::Locked(format!(
        "'{}' run by pid {} since {}; remove {} if that process is gone",
        info.operation,
        info.pid,
        info.created_at,
        path.display()
    ))
}

/// Move a stale or corrupt lock out of the way. Only one of several racing
/// runs can win the rename; a loser finds the file gone and goes on to
/// `create_new`. If the file renamed is no longer the one judged stale, a
/// newer run owns it and it is linked back.
fn set_aside(path: &Path, judged: &str, reason: &str) -> AppResult<()> {
    let aside = path.with_file_name(format!(
        "{LOCK_FILE_NAME}.{reason}.{}.{}",
        std::process::id(),
        Utc::now().timestamp_millis()
    ));

    match fs::rename(path, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    let moved = fs::read_to_string(&aside).unwrap_or_default();
    if moved != judged {
        let restored = fs::hard_link(&aside, path);
        let _ = fs::remove_file(&aside);
        return Err(match serde_json::from_str::<LockInfo>(&moved) {
            Ok(info) if restored.is_ok() => held_by(&info, path),
            _ => AppError::Locked(format!("{} was replaced concurrently", path.display())),
        });
    }

    fs::remove_file(&aside)?;
    Ok(())
}

/// A lock is stale when its owner is known to be gone. The age limit only
/// applies where liveness cannot be checked.
fn is_stale(info: &LockInfo) -> bool {
    if let Some(alive) = pid_is_alive(info.pid) {
        return !alive;
    }

    match DateTime::parse_from_rfc3339(&info.created_at) {
        Ok(created) => {
            Utc::now()
                .signed_duration_since(created.with_timezone(&Utc))
                .num_seconds()
                > LOCK_STALE_SECONDS
        }
        Err(_) => true,
    }
}

#[cfg(target_os = "linux")]
fn pid_is_alive(pid: u32) -> Option<bool> {
    Some(Path::new(&format!("/proc/{pid}")).exists())
}

#[cfg(not(target_os = "linux"))]
fn pid_is_alive(_pid: u32) -> Option<bool> {
    None
}
