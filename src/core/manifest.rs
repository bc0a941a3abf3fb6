//! Artifact manifest: the fixed list of files pulled from the server.

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    /// The run aborts when this artifact cannot be fetched.
    Required,
    /// Absence is expected (e.g. note files nobody has written yet).
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    /// Path relative to the remote base path.
    pub remote_path: String,
    /// Path relative to the snapshot directory and to the live directory.
    pub local_path: String,
    pub requirement: Requirement,
}

impl ManifestEntry {
    pub fn required(name: &str, remote_path: &str, local_path: &str) -> Self {
        Self {
            name: name.to_string(),
            remote_path: remote_path.to_string(),
            local_path: local_path.to_string(),
            requirement: Requirement::Required,
        }
    }

    pub fn optional(name: &str, remote_path: &str, local_path: &str) -> Self {
        Self {
            name: name.to_string(),
            remote_path: remote_path.to_string(),
            local_path: local_path.to_string(),
            requirement: Requirement::Optional,
        }
    }

    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            entries: vec![
                ManifestEntry::required(
                    "database",
                    "instance/attendance.db",
                    "instance/attendance.db",
                ),
                ManifestEntry::optional(
                    "week_notes",
                    "instance/week_notes.json",
                    "instance/week_notes.json",
                ),
                ManifestEntry::optional(
                    "month_notes",
                    "instance/month_notes.json",
                    "instance/month_notes.json",
                ),
                ManifestEntry::optional(
                    "adjustments",
                    "instance/manual_adjustments.json",
                    "instance/manual_adjustments.json",
                ),
                ManifestEntry::required(
                    "schedule",
                    "config/work_schedules.json",
                    "config/work_schedules.json",
                ),
            ],
        }
    }
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    pub fn required(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(|e| e.is_required())
    }

    /// Check names and paths before anything touches the filesystem.
    pub fn validate(&self) -> AppResult<()> {
        if self.entries.is_empty() {
            return Err(AppError::Config("manifest has no entries".into()));
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.name.trim().is_empty() {
                return Err(AppError::Config("manifest entry with empty name".into()));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate manifest entry '{}'",
                    entry.name
                )));
            }
            for p in [&entry.remote_path, &entry.local_path] {
                if !is_safe_relative(p) {
                    return Err(AppError::Config(format!(
                        "manifest entry '{}': '{}' must be a relative path without '..'",
                        entry.name, p
                    )));
                }
            }
        }

        if self.required().next().is_none() {
            return Err(AppError::Config(
                "manifest needs at least one required artifact".into(),
            ));
        }

        Ok(())
    }
}

fn is_safe_relative(p: &str) -> bool {
    let path = Path::new(p);
    !p.trim().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
