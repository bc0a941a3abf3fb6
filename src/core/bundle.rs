//! `bundle_<stamp>.tar.gz`: the whole live working set (database plus side
//! files) in one archive, for hand-carrying to another machine.

use crate::core::backup::stamped_name;
use crate::core::manifest::Manifest;
use crate::errors::{AppError, AppResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

pub const BUNDLE_ARCHIVE_PREFIX: &str = "bundle";

#[derive(Debug, Clone, Serialize)]
pub struct BundleHandle {
    pub path: PathBuf,
    pub included: Vec<String>,
    pub missing: Vec<String>,
    pub bytes: u64,
}

/// Archive every manifest file present in `live_dir` under its local path.
/// Missing optional files are listed in `missing`; a missing required file
/// is an error.
pub fn create_bundle(live_dir: &Path, manifest: &Manifest, dest_dir: &Path) -> AppResult<BundleHandle> {
    fs::create_dir_all(dest_dir)?;

    let mut included = Vec::new();
    let mut missing = Vec::new();
    for entry in manifest.iter() {
        if live_dir.join(&entry.local_path).is_file() {
            included.push(entry.local_path.clone());
        } else if entry.is_required() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "required file '{}' missing from {}",
                    entry.local_path,
                    live_dir.display()
                ),
            )
            .into());
        } else {
            missing.push(entry.local_path.clone());
        }
    }

    let (path, file) = create_archive_file(dest_dir, &stamped_name(BUNDLE_ARCHIVE_PREFIX))?;
    let write = || -> io::Result<()> {
        let encoder = GzEncoder::new(file, Compression::default());
        let mut archive = tar::Builder::new(encoder);
        for rel in &included {
            archive.append_path_with_name(live_dir.join(rel), rel)?;
        }
        archive.into_inner()?.finish()?.sync_all()
    };

    if let Err(e) = write() {
        let _ = fs::remove_file(&path);
        return Err(AppError::Compression {
            path: path.display().to_string(),
            reason: e.to_string(),
        });
    }

    let bytes = fs::metadata(&path)?.len();
    tracing::info!(path = %path.display(), files = included.len(), bytes, "bundle written");

    Ok(BundleHandle {
        path,
        included,
        missing,
        bytes,
    })
}

/// Claim `<base>.tar.gz` in `dest_dir`, falling back to `<base>_<n>.tar.gz`
/// when a bundle from the same second already exists.
fn create_archive_file(dest_dir: &Path, base: &str) -> AppResult<(PathBuf, fs::File)> {
    let mut path = dest_dir.join(format!("{base}.tar.gz"));
    let mut n = 1;
    loop {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                path = dest_dir.join(format!("{base}_{n}.tar.gz"));
                n += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
