use anyhow::Result;
use statscraper::{config::Settings, logging, pdf};
use tracing::info;

fn main() -> Result<()> {
    logging::init();
    let settings = Settings::from_env()?;
    let chars = pdf::extract_to_file(&settings.pdf_input, &settings.pdf_output)?;
    info!(
        input = %settings.pdf_input.display(),
        output = %settings.pdf_output.display(),
        chars,
        "PDF text saved"
    );
    Ok(())
}
