use anyhow::Result;
use statscraper::{config::Settings, logging, sources};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let settings = Settings::from_env()?;
    let summary = sources::run_named(&settings, "iea").await?;
    info!(
        units = summary.units,
        failed_units = summary.failed,
        rows = summary.rows,
        output = %summary.output.display(),
        "iea saved"
    );
    Ok(())
}
