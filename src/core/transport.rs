//! File transports used by the sync orchestrator.
//!
//! `ScpTransport` re-executes the system `scp` binary, the same way the
//! deployment scripts did. `LocalTransport` treats the remote base path as a
//! plain (possibly network-mounted) directory.

use crate::config::{Config, TRANSPORT_LOCAL, TRANSPORT_SSH};
use crate::errors::{AppError, AppResult};
use crate::utils::path::ensure_parent;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Why a single transfer did not produce a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferFailure {
    /// The remote file does not exist.
    NotFound,
    /// Anything else: connection refused, auth failure, disk full, ...
    Failed(String),
}

impl std::fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferFailure::NotFound => write!(f, "not found on remote"),
            TransferFailure::Failed(reason) => write!(f, "{reason}"),
        }
    }
}

pub trait Transport {
    /// Human-readable source, e.g. `root@srv:/opt/attendance`.
    fn describe(&self) -> String;

    /// Copy `remote_rel` (relative to the remote base) to `dest`.
    /// Returns the number of bytes written.
    fn fetch(&self, remote_rel: &str, dest: &Path) -> Result<u64, TransferFailure>;
}

/// Build the transport selected in the configuration.
pub fn from_config(cfg: &Config) -> AppResult<Box<dyn Transport>> {
    match cfg.transport.as_str() {
        TRANSPORT_SSH => Ok(Box::new(ScpTransport::new(
            &cfg.remote_target(),
            &cfg.remote_path,
            cfg.connect_timeout_secs,
        ))),
        TRANSPORT_LOCAL => Ok(Box::new(LocalTransport::new(Path::new(&cfg.remote_path)))),
        other => Err(AppError::Config(format!("unknown transport '{other}'"))),
    }
}

pub struct ScpTransport {
    target: String,
    base: String,
    connect_timeout_secs: u64,
    program: String,
}

impl ScpTransport {
    pub fn new(target: &str, base: &str, connect_timeout_secs: u64) -> Self {
        Self {
            target: target.to_string(),
            base: base.trim_end_matches('/').to_string(),
            connect_timeout_secs,
            program: "scp".to_string(),
        }
    }

    /// Use a different scp-compatible binary.
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    fn remote_spec(&self, remote_rel: &str) -> String {
        format!("{}:{}/{}", self.target, self.base, remote_rel)
    }
}

impl Transport for ScpTransport {
    fn describe(&self) -> String {
        format!("{}:{}", self.target, self.base)
    }

    fn fetch(&self, remote_rel: &str, dest: &Path) -> Result<u64, TransferFailure> {
        ensure_parent(dest).map_err(|e| TransferFailure::Failed(e.to_string()))?;

        let spec = self.remote_spec(remote_rel);
        tracing::debug!(program = %self.program, source = %spec, dest = %dest.display(), "running scp");

        let output = Command::new(&self.program)
            .arg("-q")
            .arg("-p")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout_secs))
            .arg(&spec)
            .arg(dest)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    TransferFailure::Failed(format!("'{}' not found; please install it", self.program))
                } else {
                    TransferFailure::Failed(format!("failed to launch '{}': {e}", self.program))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!(source = %spec, status = ?output.status.code(), stderr = %stderr, "scp failed");
            return Err(classify_scp_error(&stderr, output.status.code()));
        }

        fs::metadata(dest)
            .map(|m| m.len())
            .map_err(|e| TransferFailure::Failed(format!("scp reported success but {e}")))
    }
}

/// scp exits 1 for both "missing file" and most other failures; stderr tells
/// them apart.
fn classify_scp_error(stderr: &str, code: Option<i32>) -> TransferFailure {
    if stderr.contains("No such file or directory") {
        TransferFailure::NotFound
    } else if stderr.is_empty() {
        TransferFailure::Failed(format!(
            "scp exited with status {}",
            code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".into())
        ))
    } else {
        TransferFailure::Failed(stderr.to_string())
    }
}

pub struct LocalTransport {
    base: PathBuf,
}

impl LocalTransport {
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
        }
    }
}

impl Transport for LocalTransport {
    fn describe(&self) -> String {
        self.base.display().to_string()
    }

    fn fetch(&self, remote_rel: &str, dest: &Path) -> Result<u64, TransferFailure> {
        let src = self.base.join(remote_rel);
        match fs::metadata(&src) {
            Ok(m) if m.is_file() => {}
            Ok(_) => {
                return Err(TransferFailure::Failed(format!(
                    "{} is not a regular file",
                    src.display()
                )));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(TransferFailure::NotFound),
            Err(e) => return Err(TransferFailure::Failed(e.to_string())),
        }

        ensure_parent(dest).map_err(|e| TransferFailure::Failed(e.to_string()))?;
        fs::copy(&src, dest).map_err(|e| TransferFailure::Failed(e.to_string()))
    }
}
