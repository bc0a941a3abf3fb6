use crate::core::manifest::Manifest;
use crate::errors::{AppError, AppResult};
use crate::utils::path::expand_tilde;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Transport used to reach the server.
pub const TRANSPORT_SSH: &str = "ssh";
pub const TRANSPORT_LOCAL: &str = "local";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    pub table: String,
    pub entity_column: String,
    pub date_column: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            table: "attendance_records".to_string(),
            entity_column: "employee_id".to_string(),
            date_column: "date".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_live_dir")]
    pub live_dir: String,
    /// Relative values are resolved against `live_dir`.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    /// Relative to `live_dir`.
    #[serde(default = "default_primary_file")]
    pub primary_file: String,
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default = "default_remote_user")]
    pub remote_user: String,
    #[serde(default)]
    pub remote_host: String,
    #[serde(default = "default_remote_path")]
    pub remote_path: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default)]
    pub manifest: Manifest,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default = "default_clean_patterns")]
    pub clean_patterns: Vec<String>,
}

fn default_live_dir() -> String {
    ".".to_string()
}
fn default_backup_dir() -> String {
    "backups".to_string()
}
fn default_primary_file() -> String {
    "instance/attendance.db".to_string()
}
fn default_transport() -> String {
    TRANSPORT_SSH.to_string()
}
fn default_remote_user() -> String {
    "root".to_string()
}
fn default_remote_path() -> String {
    "/opt/attendance".to_string()
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_retention_days() -> u32 {
    30
}
fn default_clean_patterns() -> Vec<String> {
    [
        "*.pyc",
        "*.pyo",
        "*.tmp",
        "*.orig",
        "*.rej",
        "*~",
        ".DS_Store",
        "__pycache__",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            live_dir: default_live_dir(),
            backup_dir: default_backup_dir(),
            primary_file: default_primary_file(),
            transport: default_transport(),
            remote_user: default_remote_user(),
            remote_host: String::new(),
            remote_path: default_remote_path(),
            connect_timeout_secs: default_connect_timeout(),
            retention_days: default_retention_days(),
            manifest: Manifest::default(),
            stats: StatsConfig::default(),
            clean_patterns: default_clean_patterns(),
        }
    }
}

impl Config {
    /// Return the standard configuration directory depending on the platform
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(appdata).join("attsync")
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".attsync")
        }
    }

    /// Return the full path of the config file.
    /// `ATTSYNC_CONFIG` wins over the platform default.
    pub fn config_file() -> PathBuf {
        match env::var("ATTSYNC_CONFIG") {
            Ok(p) if !p.trim().is_empty() => expand_tilde(&p),
            _ => Self::config_dir().join("attsync.conf"),
        }
    }

    /// Load configuration from `path`, or return defaults if the file is missing.
    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(cfg)
    }

    /// Apply the process environment on top of the loaded values.
    pub fn apply_env(&mut self) -> AppResult<()> {
        self.apply_env_with(|key| env::var(key).ok())
    }

    /// Apply overrides using `lookup` as the environment.
    /// Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ATTSYNC_LIVE_DIR") {
            self.live_dir = v;
        }
        if let Some(v) = get("BACKUP_DIR") {
            self.backup_dir = v;
        }
        if let Some(v) = get("ATTSYNC_TRANSPORT") {
            self.transport = v;
        }
        if let Some(v) = get("REMOTE_USER") {
            self.remote_user = v;
        }
        if let Some(v) = get("REMOTE_HOST") {
            self.remote_host = v;
        }
        if let Some(v) = get("REMOTE_PATH") {
            self.remote_path = v;
        }
        if let Some(v) = get("RETENTION_DAYS") {
            self.retention_days = v.trim().parse().map_err(|_| {
                AppError::Config(format!("RETENTION_DAYS must be a whole number, got '{v}'"))
            })?;
        }

        Ok(())
    }

    /// Accepts either `host` or `user@host`.
    pub fn set_remote_target(&mut self, target: &str) {
        match target.split_once('@') {
            Some((user, host)) => {
                self.remote_user = user.to_string();
                self.remote_host = host.to_string();
            }
            None => self.remote_host = target.to_string(),
        }
    }

    /// `user@host` as passed to scp.
    pub fn remote_target(&self) -> String {
        if self.remote_user.trim().is_empty() {
            self.remote_host.clone()
        } else {
            format!("{}@{}", self.remote_user, self.remote_host)
        }
    }

    pub fn live_dir_path(&self) -> PathBuf {
        expand_tilde(&self.live_dir)
    }

    pub fn backup_dir_path(&self) -> PathBuf {
        let p = expand_tilde(&self.backup_dir);
        if p.is_absolute() {
            p
        } else {
            self.live_dir_path().join(p)
        }
    }

    pub fn primary_file_path(&self) -> PathBuf {
        self.live_dir_path().join(&self.primary_file)
    }

    /// Glob matching the compressed snapshots of the primary file,
    /// e.g. `attendance_*.db.gz`.
    pub fn snapshot_pattern(&self) -> String {
        let primary = Path::new(&self.primary_file);
        let stem = primary
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "snapshot".to_string());
        match primary.extension() {
            Some(ext) => format!("{}_*.{}.gz", stem, ext.to_string_lossy()),
            None => format!("{}_*.gz", stem),
        }
    }

    /// Reject configurations that cannot possibly run.
    pub fn validate(&self) -> AppResult<()> {
        match self.transport.as_str() {
            TRANSPORT_SSH => {
                if self.remote_host.trim().is_empty() {
                    return Err(AppError::Config(
                        "remote host is not set (config 'remote_host', REMOTE_HOST or --remote)"
                            .into(),
                    ));
                }
            }
            TRANSPORT_LOCAL => {}
            other => {
                return Err(AppError::Config(format!(
                    "unknown transport '{other}' (expected '{TRANSPORT_SSH}' or '{TRANSPORT_LOCAL}')"
                )));
            }
        }

        if self.remote_path.trim().is_empty() {
            return Err(AppError::Config("remote path is empty".into()));
        }
        if self.retention_days == 0 {
            return Err(AppError::Config("retention_days must be at least 1".into()));
        }
        if self.primary_file.trim().is_empty() {
            return Err(AppError::Config("primary_file is empty".into()));
        }

        self.manifest.validate()
    }

    /// Write the default configuration file, leaving an existing one alone.
    /// Returns true when a file was written.
    pub fn write_default(path: &Path) -> AppResult<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(&Config::default())?;
        fs::write(path, yaml)?;
        Ok(true)
    }
}
