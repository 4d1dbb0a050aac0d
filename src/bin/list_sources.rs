use anyhow::Result;
use statscraper::{config::Settings, sources::registry};

/// Print the effective source table as YAML; the output is a valid SOURCES_FILE.
fn main() -> Result<()> {
    let settings = Settings::from_env()?;
    let table = registry::load(settings.sources_file.as_deref())?;
    let specs: Vec<_> = table.values().collect();
    print!("{}", serde_yaml::to_string(&specs)?);
    Ok(())
}
