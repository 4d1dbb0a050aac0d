//! The declarative source table and the fetch → normalize → save loop that runs it.

pub mod registry;
pub mod runner;
pub mod spec;
pub mod template;

use anyhow::{anyhow, Result};
use tracing::{error, info};

pub use runner::{run_source, RunSummary};
pub use spec::{Iteration, PayloadFormat, SourceSpec};

use crate::config::Settings;
use crate::fetch;

/// Run the named source from the configured table.
pub async fn run_named(settings: &Settings, name: &str) -> Result<RunSummary> {
    let table = registry::load(settings.sources_file.as_deref())?;
    let spec = table.get(name).ok_or_else(|| {
        anyhow!(
            "unknown source {:?}; known: {}",
            name,
            table.keys().cloned().collect::<Vec<_>>().join(", ")
        )
    })?;
    let client = fetch::build_client(settings.http_timeout)?;
    run_source(&client, settings, spec).await
}

/// Run every configured source in turn. A source that fails is logged and the
/// next one still runs; the error count is returned alongside the summaries.
pub async fn run_all(settings: &Settings) -> Result<(Vec<RunSummary>, usize)> {
    let table = registry::load(settings.sources_file.as_deref())?;
    let client = fetch::build_client(settings.http_timeout)?;

    let mut done = Vec::with_capacity(table.len());
    let mut failed = 0usize;
    for spec in table.values() {
        match run_source(&client, settings, spec).await {
            Ok(summary) => done.push(summary),
            Err(e) => {
                failed += 1;
                error!(source = %spec.name, "source failed: {:#}", e);
            }
        }
    }
    info!(ok = done.len(), failed, "all sources finished");
    Ok((done, failed))
}
