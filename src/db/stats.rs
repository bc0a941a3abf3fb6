//! Read-only statistics over the attendance database, for operator reports.

use crate::config::StatsConfig;
use crate::db::pool::DbPool;
use crate::utils::colors::{CYAN, GREEN, GREY, RESET, YELLOW};
use crate::utils::human_bytes;
use rusqlite::OptionalExtension;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub record_count: i64,
    pub unique_entity_count: i64,
    pub date_range_min: Option<String>,
    pub date_range_max: Option<String>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DatasetStatistics {
    Available(Stats),
    Unavailable { reason: String },
}

impl DatasetStatistics {
    pub fn stats(&self) -> Option<&Stats> {
        match self {
            DatasetStatistics::Available(s) => Some(s),
            DatasetStatistics::Unavailable { .. } => None,
        }
    }
}

/// Never fails: an absent or unreadable file is reported as `Unavailable`.
pub fn compute_dataset_statistics(db_path: &Path, cfg: &StatsConfig) -> DatasetStatistics {
    match try_compute(db_path, cfg) {
        Ok(stats) => DatasetStatistics::Available(stats),
        Err(reason) => {
            tracing::debug!(path = %db_path.display(), reason = %reason, "statistics unavailable");
            DatasetStatistics::Unavailable { reason }
        }
    }
}

fn try_compute(db_path: &Path, cfg: &StatsConfig) -> Result<Stats, String> {
    let meta = fs::metadata(db_path).map_err(|e| format!("{}: {}", db_path.display(), e))?;
    if !meta.is_file() {
        return Err(format!("{} is not a file", db_path.display()));
    }

    let pool = DbPool::open_read_only(db_path).map_err(|e| e.to_string())?;

    let table = quote_ident(&cfg.table);
    let entity = quote_ident(&cfg.entity_column);
    let date = quote_ident(&cfg.date_column);

    let exists: Option<String> = pool
        .conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [&cfg.table],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| e.to_string())?;
    if exists.is_none() {
        return Err(format!("table '{}' not found", cfg.table));
    }

    let sql = format!(
        "SELECT COUNT(*), COUNT(DISTINCT {entity}), MIN({date}), MAX({date}) FROM {table}"
    );
    let (record_count, unique_entity_count, date_range_min, date_range_max) = pool
        .conn
        .query_row(&sql, [], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })
        .map_err(|e| e.to_string())?;

    Ok(Stats {
        record_count,
        unique_entity_count,
        date_range_min,
        date_range_max,
        size_bytes: meta.len(),
    })
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn print_statistics(db_path: &Path, stats: &DatasetStatistics) {
    println!("{}• File:{} {}{}{}", CYAN, RESET, YELLOW, db_path.display(), RESET);

    match stats {
        DatasetStatistics::Available(s) => {
            println!("{}• Size:{} {}", CYAN, RESET, human_bytes(s.size_bytes));
            println!(
                "{}• Records:{} {}{}{}",
                CYAN, RESET, GREEN, s.record_count, RESET
            );
            println!(
                "{}• Employees:{} {}{}{}",
                CYAN, RESET, GREEN, s.unique_entity_count, RESET
            );

            let dash = format!("{GREY}--{RESET}");
            println!("{}• Date range:{}", CYAN, RESET);
            println!("    from: {}", s.date_range_min.as_deref().unwrap_or(dash.as_str()));
            println!("    to:   {}", s.date_range_max.as_deref().unwrap_or(dash.as_str()));
        }
        DatasetStatistics::Unavailable { reason } => {
            println!("{}• Statistics:{} {}unavailable{} ({})", CYAN, RESET, GREY, RESET, reason);
        }
    }
}
