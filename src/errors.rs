//! Unified application error type.
//! All modules (config, core, db, cli) return AppError so that the binary
//! can print one message and pick one exit status.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // IO
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Snapshot compression failed for {path}: {reason}")]
    Compression { path: String, reason: String },

    // ---------------------------
    // Database-related
    // ---------------------------
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    // ---------------------------
    // Sync errors
    // ---------------------------
    #[error("Required artifact '{artifact}' is missing on the remote side ({remote})")]
    RequiredArtifactMissing { artifact: String, remote: String },

    #[error("Transfer of '{artifact}' failed: {reason}")]
    Transfer { artifact: String, reason: String },

    // ---------------------------
    // Config errors
    // ---------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ---------------------------
    // Run control
    // ---------------------------
    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Another run holds the lock: {0}")]
    Locked(String),

    // ---------------------------
    // Generic fallback
    // ---------------------------
    #[error("Internal error: {0}")]
    Other(String),
}

impl AppError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::RequiredArtifactMissing { .. } => 2,
            AppError::Transfer { .. } => 3,
            AppError::Config(_) | AppError::Yaml(_) => 4,
            AppError::Cancelled => 5,
            AppError::Locked(_) => 6,
            _ => 1,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
