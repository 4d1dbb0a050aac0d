use anyhow::{bail, Result};
use statscraper::{config::Settings, logging, sources};
use tokio::time::Instant;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    logging::init();
    info!("startup");

    // ─── 2) settings ─────────────────────────────────────────────────
    let settings = Settings::from_env()?;
    info!(data_dir = %settings.data_dir.display(), "configured");

    // ─── 3) run every source in turn ─────────────────────────────────
    let start = Instant::now();
    let (done, failed) = sources::run_all(&settings).await?;
    for s in &done {
        info!(
            source = %s.source,
            units = s.units,
            failed_units = s.failed,
            rows = s.rows,
            output = %s.output.display(),
            "source done"
        );
    }
    info!(elapsed = ?start.elapsed(), "all done");

    if failed > 0 {
        bail!("{} source(s) failed", failed);
    }
    Ok(())
}
