#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use filetime::{FileTime, set_file_mtime};
use rusqlite::{Connection, params};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// The binary with a clean environment: no user config file, no
/// REMOTE_* / RETENTION_DAYS leaking in from the caller's shell.
pub fn att(ws: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("attsync");
    cmd.env("ATTSYNC_CONFIG", ws.join("attsync.conf"))
        .env_remove("ATTSYNC_LIVE_DIR")
        .env_remove("ATTSYNC_TRANSPORT")
        .env_remove("BACKUP_DIR")
        .env_remove("REMOTE_USER")
        .env_remove("REMOTE_HOST")
        .env_remove("REMOTE_PATH")
        .env_remove("RETENTION_DAYS")
        .env_remove("RUST_LOG");
    cmd
}

/// Create a fresh, empty workspace inside the system temp dir
pub fn setup_workspace(name: &str) -> PathBuf {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("attsync_test_{}", name));
    fs::remove_dir_all(&path).ok();
    fs::create_dir_all(&path).expect("create workspace");
    path
}

pub fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write file");
}

/// Create an attendance database with one row per (employee, date).
pub fn seed_db(path: &Path, rows: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::remove_file(path).ok();
    let conn = Connection::open(path).expect("open db");
    conn.execute_batch(
        "CREATE TABLE attendance_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_id TEXT NOT NULL,
            date TEXT NOT NULL,
            record_type TEXT NOT NULL DEFAULT 'office',
            pf_status TEXT
        );",
    )
    .expect("create table");
    for (emp, date) in rows {
        conn.execute(
            "INSERT INTO attendance_records (employee_id, date) VALUES (?1, ?2)",
            params![emp, date],
        )
        .expect("insert row");
    }
}

/// Set the modification time of `path` to `days` days ago.
pub fn set_age_days(path: &Path, days: u64) {
    let t = SystemTime::now() - Duration::from_secs(days * 86_400);
    set_file_mtime(path, FileTime::from_system_time(t)).expect("set mtime");
}

/// Remote side with the two required files and one optional note file.
pub fn seed_remote(remote: &Path) {
    seed_db(
        &remote.join("instance/attendance.db"),
        &[
            ("E001", "2026-09-01"),
            ("E001", "2026-09-02"),
            ("E002", "2026-09-02"),
            ("E003", "2026-10-15"),
        ],
    );
    write_file(
        &remote.join("config/work_schedules.json"),
        br#"{"default": {"start": "09:00", "end": "18:00"}}"#,
    );
    write_file(
        &remote.join("instance/month_notes.json"),
        br#"{"2026-09": "audit month"}"#,
    );
}

/// Relative path → content of every file under `root`.
pub fn snapshot_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut out = BTreeMap::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_file() {
            let rel = entry
                .path()
                .strip_prefix(root)
                .expect("strip prefix")
                .to_string_lossy()
                .to_string();
            out.insert(rel, fs::read(entry.path()).expect("read file"));
        }
    }
    out
}

/// Names of the entries directly inside `dir`.
pub fn names_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(r) => r
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Decompress a `.gz` file fully.
pub fn gunzip(path: &Path) -> Vec<u8> {
    use std::io::Read;
    let file = fs::File::open(path).expect("open gz");
    let mut decoder = flate2::read::GzDecoder::new(file);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).expect("decompress");
    out
}
