mod common;
use attsync::config::StatsConfig;
use attsync::core::bundle::create_bundle;
use attsync::core::clean::CleanLogic;
use attsync::core::lock::{LOCK_FILE_NAME, RunLock};
use attsync::core::manifest::Manifest;
use attsync::db::stats::{DatasetStatistics, compute_dataset_statistics};
use attsync::errors::AppError;
use common::{att, seed_db, setup_workspace, write_file};
use predicates::str::contains;
use std::fs;

#[test]
fn statistics_do_not_modify_the_database() {
    let ws = setup_workspace("stats_read_only");
    let db = ws.join("attendance.db");
    seed_db(&db, &[("E1", "2026-05-01"), ("E1", "2026-05-02"), ("E2", "2026-04-30")]);
    let bytes_before = fs::read(&db).unwrap();
    let mtime_before = fs::metadata(&db).unwrap().modified().unwrap();

    let stats = compute_dataset_statistics(&db, &StatsConfig::default());
    let s = stats.stats().expect("available");
    assert_eq!(s.record_count, 3);
    assert_eq!(s.unique_entity_count, 2);
    assert_eq!(s.date_range_min.as_deref(), Some("2026-04-30"));
    assert_eq!(s.date_range_max.as_deref(), Some("2026-05-02"));
    assert_eq!(s.size_bytes, bytes_before.len() as u64);

    assert_eq!(fs::read(&db).unwrap(), bytes_before);
    assert_eq!(fs::metadata(&db).unwrap().modified().unwrap(), mtime_before);
}

#[test]
fn statistics_degrade_instead_of_failing() {
    let ws = setup_workspace("stats_degrade");

    let absent = compute_dataset_statistics(&ws.join("missing.db"), &StatsConfig::default());
    assert!(matches!(absent, DatasetStatistics::Unavailable { .. }));
    assert!(!ws.join("missing.db").exists(), "must not create the file");

    let garbage = ws.join("garbage.db");
    write_file(&garbage, b"this is not sqlite at all, just some text padding it out");
    assert!(matches!(
        compute_dataset_statistics(&garbage, &StatsConfig::default()),
        DatasetStatistics::Unavailable { .. }
    ));

    let other_schema = ws.join("other.db");
    seed_db(&other_schema, &[]);
    let cfg = StatsConfig {
        table: "timesheets".into(),
        ..StatsConfig::default()
    };
    match compute_dataset_statistics(&other_schema, &cfg) {
        DatasetStatistics::Unavailable { reason } => assert!(reason.contains("timesheets")),
        other => panic!("expected unavailable, got {other:?}"),
    }
}

#[test]
fn empty_table_has_no_date_range() {
    let ws = setup_workspace("stats_empty");
    let db = ws.join("attendance.db");
    seed_db(&db, &[]);

    let stats = compute_dataset_statistics(&db, &StatsConfig::default());
    let s = stats.stats().expect("available");
    assert_eq!(s.record_count, 0);
    assert_eq!(s.date_range_min, None);
    assert_eq!(s.date_range_max, None);
}

#[test]
fn lock_is_exclusive_and_released_on_drop() {
    let ws = setup_workspace("lock_exclusive");

    let first = RunLock::acquire(&ws, "backup").expect("first lock");
    assert!(ws.join(LOCK_FILE_NAME).exists());

    let err = RunLock::acquire(&ws, "sync").unwrap_err();
    assert!(matches!(err, AppError::Locked(ref msg) if msg.contains("backup")));
    assert_eq!(err.exit_code(), 6);

    drop(first);
    assert!(!ws.join(LOCK_FILE_NAME).exists());

    let again = RunLock::acquire(&ws, "sync").expect("lock after release");
    again.release().expect("release");
    assert!(!ws.join(LOCK_FILE_NAME).exists());
}

#[test]
fn stale_and_corrupt_locks_are_replaced() {
    let ws = setup_workspace("lock_stale");
    write_file(
        &ws.join(LOCK_FILE_NAME),
        br#"{"pid": 4000000000, "created_at": "2001-01-01T00:00:00+00:00", "operation": "sync"}"#,
    );
    RunLock::acquire(&ws, "backup").expect("stale lock replaced");

    write_file(&ws.join(LOCK_FILE_NAME), b"garbage");
    let held = RunLock::acquire(&ws, "backup").expect("corrupt lock replaced");

    let names: Vec<String> = fs::read_dir(&ws)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec![LOCK_FILE_NAME.to_string()]);
    drop(held);
}

#[cfg(target_os = "linux")]
#[test]
fn old_lock_of_a_running_process_is_kept() {
    let ws = setup_workspace("lock_live_owner");
    let created_at = (chrono::Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
    let contents = format!(
        r#"{{"pid": {}, "created_at": "{}", "operation": "sync"}}"#,
        std::process::id(),
        created_at
    );
    write_file(&ws.join(LOCK_FILE_NAME), contents.as_bytes());

    let err = RunLock::acquire(&ws, "backup").unwrap_err();
    assert!(matches!(err, AppError::Locked(ref msg) if msg.contains("sync")));
    assert_eq!(fs::read_to_string(ws.join(LOCK_FILE_NAME)).unwrap(), contents);
}

#[test]
fn backup_refuses_to_run_while_locked() {
    let ws = setup_workspace("cli_backup_locked");
    let live = ws.join("live");
    seed_db(&live.join("instance/attendance.db"), &[("E1", "2026-01-01")]);
    let _held = RunLock::acquire(&live, "sync").expect("lock");

    att(&ws)
        .args(["--live-dir", live.to_str().unwrap(), "backup"])
        .assert()
        .failure()
        .code(6)
        .stderr(contains("lock"));
}

#[test]
fn clean_finds_stray_files_but_skips_backups_and_vcs() {
    let ws = setup_workspace("clean_find");
    let live = ws.join("live");
    write_file(&live.join("instance/attendance.db"), b"db");
    write_file(&live.join("app/__pycache__/views.cpython-312.pyc"), b"x");
    write_file(&live.join("app/models.py~"), b"x");
    write_file(&live.join(".DS_Store"), b"x");
    write_file(&live.join("backups/leftover.tmp"), b"x");
    write_file(&live.join(".git/index.orig"), b"x");

    let patterns: Vec<String> = ["*.pyc", "*~", ".DS_Store", "__pycache__", "*.tmp", "*.orig"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut found = CleanLogic::find_stray(&live, &patterns, &[live.join("backups")]).expect("find");
    found.sort();

    let mut expected = vec![
        live.join(".DS_Store"),
        live.join("app/__pycache__"),
        live.join("app/models.py~"),
    ];
    expected.sort();
    assert_eq!(found, expected);

    let report = CleanLogic::remove(&found);
    assert_eq!(report.removed.len(), 3);
    assert!(report.failed.is_empty());
    assert!(!live.join("app/__pycache__").exists());
    assert!(live.join("backups/leftover.tmp").exists());
    assert!(live.join("instance/attendance.db").exists());
}

#[test]
fn clean_needs_confirmation() {
    let ws = setup_workspace("cli_clean_confirm");
    let live = ws.join("live");
    write_file(&live.join("notes.tmp"), b"x");

    att(&ws)
        .args(["--live-dir", live.to_str().unwrap(), "clean", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("notes.tmp"));
    assert!(live.join("notes.tmp").exists());

    att(&ws)
        .args(["--live-dir", live.to_str().unwrap(), "clean"])
        .write_stdin("")
        .assert()
        .failure()
        .code(5);
    assert!(live.join("notes.tmp").exists());

    att(&ws)
        .args(["--live-dir", live.to_str().unwrap(), "--yes", "clean"])
        .assert()
        .success()
        .stdout(contains("1 stray item(s) removed"));
    assert!(!live.join("notes.tmp").exists());
}

#[test]
fn bundle_archives_present_manifest_files() {
    let ws = setup_workspace("bundle");
    let live = ws.join("live");
    seed_db(&live.join("instance/attendance.db"), &[("E1", "2026-01-01")]);
    write_file(&live.join("config/work_schedules.json"), b"{}");
    write_file(&live.join("instance/month_notes.json"), b"{\"2026-01\": \"x\"}");

    let bundle = create_bundle(&live, &Manifest::default(), &ws.join("backups")).expect("bundle");
    assert_eq!(bundle.included.len(), 3);
    assert_eq!(bundle.missing.len(), 2);

    let file = fs::File::open(&bundle.path).unwrap();
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    let mut names: Vec<String> = archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "config/work_schedules.json".to_string(),
            "instance/attendance.db".to_string(),
            "instance/month_notes.json".to_string(),
        ]
    );
}

#[test]
fn bundles_in_the_same_second_do_not_overwrite_each_other() {
    let ws = setup_workspace("bundle_twice");
    let live = ws.join("live");
    seed_db(&live.join("instance/attendance.db"), &[("E1", "2026-01-01")]);
    write_file(&live.join("config/work_schedules.json"), b"{}");
    let backups = ws.join("backups");

    let first = create_bundle(&live, &Manifest::default(), &backups).expect("first bundle");
    let second = create_bundle(&live, &Manifest::default(), &backups).expect("second bundle");

    assert_ne!(first.path, second.path);
    assert!(first.path.is_file());
    assert!(second.path.is_file());
    assert_eq!(fs::metadata(&first.path).unwrap().len(), first.bytes);
}

#[test]
fn bundle_without_required_file_fails() {
    let ws = setup_workspace("bundle_missing_required");
    let live = ws.join("live");
    write_file(&live.join("instance/attendance.db"), b"db");

    let err = create_bundle(&live, &Manifest::default(), &ws.join("backups")).unwrap_err();
    assert!(err.to_string().contains("work_schedules.json"));
}
