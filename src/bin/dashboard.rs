use anyhow::Result;
use statscraper::{config::Settings, dashboard, logging};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let settings = Settings::from_env()?;
    dashboard::run(&settings).await
}
