mod common;
use attsync::core::backup::BackupLogic;
use attsync::errors::AppError;
use common::{gunzip, names_in, set_age_days, setup_workspace, write_file};
use std::fs;
use std::time::{Duration, SystemTime};

#[test]
fn snapshot_round_trip_yields_source_bytes() {
    let ws = setup_workspace("backup_round_trip");
    let src = ws.join("instance/attendance.db");
    let content: Vec<u8> = (0..50_000u32).flat_map(|i| i.to_le_bytes()).collect();
    write_file(&src, &content);

    let handle = BackupLogic::create_snapshot(&src, &ws.join("backups")).expect("snapshot");

    let name = handle.path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("attendance_"), "unexpected name {name}");
    assert!(name.ends_with(".db.gz"), "unexpected name {name}");
    assert_eq!(handle.source_bytes, content.len() as u64);
    assert_eq!(gunzip(&handle.path), content);

    // only the compressed artifact is left behind
    assert_eq!(names_in(&ws.join("backups")), vec![name]);
}

#[test]
fn snapshots_in_the_same_second_do_not_collide() {
    let ws = setup_workspace("backup_collision");
    let src = ws.join("attendance.db");
    write_file(&src, b"first");

    let a = BackupLogic::create_snapshot(&src, &ws.join("backups")).expect("first");
    let b = BackupLogic::create_snapshot(&src, &ws.join("backups")).expect("second");

    assert_ne!(a.path, b.path);
    assert_eq!(names_in(&ws.join("backups")).len(), 2);
}

#[test]
fn missing_source_is_an_io_error() {
    let ws = setup_workspace("backup_missing_source");
    let err = BackupLogic::create_snapshot(&ws.join("nope.db"), &ws.join("backups")).unwrap_err();
    assert!(matches!(err, AppError::Io(_)), "got {err:?}");
    assert!(!ws.join("backups").exists() || names_in(&ws.join("backups")).is_empty());
}

#[test]
fn unusable_destination_is_an_io_error() {
    let ws = setup_workspace("backup_bad_dest");
    let src = ws.join("attendance.db");
    write_file(&src, b"data");
    // a regular file where the backup directory should be
    write_file(&ws.join("backups"), b"not a dir");

    let err = BackupLogic::create_snapshot(&src, &ws.join("backups")).unwrap_err();
    assert!(matches!(err, AppError::Io(_)), "got {err:?}");
}

#[test]
fn sweep_removes_only_expired_matching_entries() {
    let ws = setup_workspace("sweep_subset");
    let dir = ws.join("backups");

    let old = dir.join("attendance_20260801_000000.db.gz");
    let fresh = dir.join("attendance_20261010_000000.db.gz");
    let old_other = dir.join("unrelated_20260101.txt");
    for p in [&old, &fresh, &old_other] {
        write_file(p, b"x");
    }
    set_age_days(&old, 45);
    set_age_days(&fresh, 5);
    set_age_days(&old_other, 400);

    let report = BackupLogic::sweep_expired(&dir, "attendance_*.db.gz", 30).expect("sweep");
    assert_eq!(report.removed, vec![old.clone()]);
    assert_eq!(report.kept, 1);
    assert!(report.failed.is_empty());
    assert!(!old.exists());
    assert!(fresh.exists());
    assert!(old_other.exists());

    // idempotent: nothing left to remove
    let again = BackupLogic::sweep_expired(&dir, "attendance_*.db.gz", 30).expect("sweep again");
    assert_eq!(again.removed_count(), 0);
}

#[test]
fn sweep_uses_mtime_not_the_name() {
    let ws = setup_workspace("sweep_mtime_wins");
    let dir = ws.join("backups");

    // name says 2020, file was touched yesterday
    let misleading = dir.join("attendance_20200101_000000.db.gz");
    write_file(&misleading, b"x");
    set_age_days(&misleading, 1);

    let report = BackupLogic::sweep_expired(&dir, "attendance_*.db.gz", 30).expect("sweep");
    assert_eq!(report.removed_count(), 0);
    assert!(misleading.exists());
}

#[test]
fn sweep_boundary_uses_strictly_older() {
    let ws = setup_workspace("sweep_boundary");
    let dir = ws.join("backups");
    let p = dir.join("attendance_x.db.gz");
    write_file(&p, b"x");

    let mtime = fs::metadata(&p).unwrap().modified().unwrap();
    let day = Duration::from_secs(86_400);

    let exactly = BackupLogic::sweep_expired_at(&dir, "attendance_*.db.gz", 2, mtime + 2 * day, false)
        .expect("sweep");
    assert_eq!(exactly.removed_count(), 0);

    let past = BackupLogic::sweep_expired_at(
        &dir,
        "attendance_*.db.gz",
        2,
        mtime + 2 * day + Duration::from_secs(1),
        true,
    )
    .expect("dry run");
    assert_eq!(past.removed_count(), 1);
    assert!(p.exists(), "dry run must not delete");
}

#[test]
fn sweep_removes_expired_bundle_directories() {
    let ws = setup_workspace("sweep_bundle_dirs");
    let dir = ws.join("backups");
    let bundle = dir.join("server_backup_20260801_120000");
    write_file(&bundle.join("instance/attendance.db"), b"db");
    write_file(&bundle.join("config/work_schedules.json"), b"{}");
    set_age_days(&bundle, 40);

    let report = BackupLogic::sweep_expired(&dir, "server_backup_*", 30).expect("sweep");
    assert_eq!(report.removed_count(), 1);
    assert!(!bundle.exists());
}

#[test]
fn sweep_on_missing_directory_is_a_no_op() {
    let ws = setup_workspace("sweep_missing_dir");
    let report = BackupLogic::sweep_expired(&ws.join("nothing"), "*.gz", 30).expect("sweep");
    assert_eq!(report.removed_count(), 0);
    assert_eq!(BackupLogic::count_snapshots(&ws.join("nothing"), "*.gz").unwrap(), 0);
}

#[test]
fn future_mtime_counts_as_fresh() {
    let ws = setup_workspace("sweep_future");
    let dir = ws.join("backups");
    let p = dir.join("attendance_future.db.gz");
    write_file(&p, b"x");
    let report = BackupLogic::sweep_expired_at(
        &dir,
        "attendance_*.db.gz",
        1,
        SystemTime::now() - Duration::from_secs(10 * 86_400),
        false,
    )
    .expect("sweep");
    assert_eq!(report.removed_count(), 0);
    assert_eq!(report.kept, 1);
}
