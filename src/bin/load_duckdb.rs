use anyhow::Result;
use statscraper::{config::Settings, duck, logging};
use tracing::{info, warn};

fn main() -> Result<()> {
    // 1. Configuration
    logging::init();
    let settings = Settings::from_env()?;

    // 2. Open (or create) the database file
    let conn = duck::open_disk_db(&settings.duckdb_path)?;

    // 3. Replace one table per <domain>/<file>.csv
    let summary = duck::load_directory(&conn, &settings.processed_dir, settings.loader_on_error)?;
    for (table, rows) in &summary.loaded {
        info!(table = %table, rows, "table ready");
    }
    info!(
        loaded = summary.loaded.len(),
        failed = summary.failed.len(),
        db = %settings.duckdb_path.display(),
        "load finished"
    );
    for (file, reason) in &summary.failed {
        warn!(file = %file.display(), "skipped: {}", reason);
    }
    Ok(())
}
