use crate::config::Config;
use crate::core::bundle::create_bundle;
use crate::core::lock::RunLock;
use crate::errors::AppResult;
use crate::ui::messages::{success, warning};
use crate::utils::human_bytes;

pub fn handle(cfg: &Config) -> AppResult<()> {
    let live_dir = cfg.live_dir_path();
    let _lock = RunLock::acquire(&live_dir, "bundle")?;

    let bundle = create_bundle(&live_dir, &cfg.manifest, &cfg.backup_dir_path())?;
    for rel in &bundle.missing {
        warning(format!("{} not present, left out of the bundle", rel));
    }
    success(format!(
        "Bundle created: {} ({} file(s), {})",
        bundle.path.display(),
        bundle.included.len(),
        human_bytes(bundle.bytes)
    ));
    Ok(())
}
