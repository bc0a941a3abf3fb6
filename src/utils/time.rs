//! Time utilities: snapshot timestamps and file ages.

use chrono::{DateTime, Local, NaiveDateTime};
use std::time::SystemTime;

/// Timestamp format embedded in snapshot names.
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn stamp_of(t: &DateTime<Local>) -> String {
    t.format(STAMP_FORMAT).to_string()
}

pub fn now_stamp() -> String {
    stamp_of(&Local::now())
}

/// Extract the `YYYYMMDD_HHMMSS` part of a snapshot name, if any.
/// Only informational: retention always uses the file's mtime.
pub fn parse_stamp_in_name(name: &str) -> Option<NaiveDateTime> {
    let bytes = name.as_bytes();
    if bytes.len() < 15 {
        return None;
    }
    (0..=bytes.len() - 15).find_map(|i| {
        name.get(i..i + 15)
            .and_then(|s| NaiveDateTime::parse_from_str(s, STAMP_FORMAT).ok())
    })
}

/// Whole days elapsed between `t` and `now` (zero for future times).
pub fn age_in_days(t: SystemTime, now: SystemTime) -> u64 {
    now.duration_since(t)
        .map(|d| d.as_secs() / 86_400)
        .unwrap_or(0)
}

pub fn to_local(t: SystemTime) -> DateTime<Local> {
    DateTime::<Local>::from(t)
}

pub fn format_local(t: SystemTime) -> String {
    to_local(t).format("%Y-%m-%d %H:%M").to_string()
}
