//! Removal of stray files (editor leftovers, bytecode caches, merge
//! residue) from the live directory.

use crate::errors::{AppError, AppResult};
use glob::Pattern;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories never descended into.
const SKIP_DIRS: &[&str] = &[".git", ".hg", ".svn", "node_modules", ".venv", "venv"];

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct CleanLogic;

impl CleanLogic {
    /// Everything under `root` whose file name matches one of `patterns`.
    /// `exclude` (typically the backup directory) is skipped entirely, and
    /// matching directories are listed once without their contents.
    pub fn find_stray(root: &Path, patterns: &[String], exclude: &[PathBuf]) -> AppResult<Vec<PathBuf>> {
        let matchers = patterns
            .iter()
            .map(|p| {
                Pattern::new(p)
                    .map_err(|e| AppError::Config(format!("invalid clean pattern '{p}': {e}")))
            })
            .collect::<AppResult<Vec<_>>>()?;

        let mut found = Vec::new();
        let mut walker = WalkDir::new(root).min_depth(1).into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            let path = entry.path();
            let name = entry.file_name().to_string_lossy();
            let is_dir = entry.file_type().is_dir();

            if is_dir && (SKIP_DIRS.contains(&&*name) || exclude.iter().any(|x| x == path)) {
                walker.skip_current_dir();
                continue;
            }

            if matchers.iter().any(|m| m.matches(&name)) {
                found.push(path.to_path_buf());
                if is_dir {
                    walker.skip_current_dir();
                }
            }
        }

        Ok(found)
    }

    /// Delete `targets`, continuing past individual failures.
    pub fn remove(targets: &[PathBuf]) -> CleanReport {
        let mut report = CleanReport::default();
        for path in targets {
            let result = match fs::symlink_metadata(path) {
                Ok(m) if m.is_dir() => fs::remove_dir_all(path),
                Ok(_) => fs::remove_file(path),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => report.removed.push(path.clone()),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove stray file");
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }
        report
    }
}
