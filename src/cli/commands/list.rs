use crate::cli::commands::sweep::default_patterns;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::info;
use crate::utils::formatting::describe_age;
use crate::utils::human_bytes;
use crate::utils::table::{Column, Table};
use crate::utils::time::{age_in_days, format_local, parse_stamp_in_name};
use glob::Pattern;
use std::fs;
use std::io;
use std::time::SystemTime;
use walkdir::WalkDir;

pub fn handle(cfg: &Config) -> AppResult<()> {
    let dir = cfg.backup_dir_path();
    let matchers = default_patterns(cfg)
        .iter()
        .map(|p| Pattern::new(p).map_err(|e| AppError::Config(e.to_string())))
        .collect::<AppResult<Vec<_>>>()?;

    let read = match fs::read_dir(&dir) {
        Ok(r) => r,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info(format!("No backup directory at {}", dir.display()));
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for entry in read {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if matchers.iter().any(|m| m.matches(&name)) {
            entries.push((name, entry.path(), entry.metadata()?));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    if entries.is_empty() {
        info(format!("No snapshots in {}", dir.display()));
        return Ok(());
    }

    let now = SystemTime::now();
    let mut table = Table::new(vec![
        Column::left("Snapshot"),
        Column::left("Kind"),
        Column::right("Size"),
        Column::left("Taken"),
        Column::left("Modified"),
        Column::right("Age"),
    ]);

    let mut total = 0u64;
    for (name, path, meta) in &entries {
        let size = if meta.is_dir() {
            WalkDir::new(path)
                .into_iter()
                .filter_map(Result::ok)
                .filter_map(|e| e.metadata().ok())
                .filter(|m| m.is_file())
                .map(|m| m.len())
                .sum::<u64>()
        } else {
            meta.len()
        };
        total += size;

        let modified = meta.modified()?;
        table.add_row(vec![
            name.clone(),
            if meta.is_dir() { "bundle dir" } else { "file" }.to_string(),
            human_bytes(size),
            parse_stamp_in_name(name)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "--".to_string()),
            format_local(modified),
            describe_age(age_in_days(modified, now)),
        ]);
    }

    print!("{}", table.render());
    info(format!(
        "{} snapshot(s), {} total, retention {} days",
        entries.len(),
        human_bytes(total),
        cfg.retention_days
    ));
    Ok(())
}
