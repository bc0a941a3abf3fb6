use crate::config::Config;
use crate::db::stats::{compute_dataset_statistics, print_statistics};
use crate::errors::AppResult;

pub fn handle(cfg: &Config) -> AppResult<()> {
    let path = cfg.primary_file_path();
    let stats = compute_dataset_statistics(&path, &cfg.stats);
    print_statistics(&path, &stats);
    Ok(())
}
