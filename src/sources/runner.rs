use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use super::spec::{Iteration, PayloadFormat, SourceSpec};
use super::template::{expand, Vars};
use crate::config::{FailurePolicy, Settings};
use crate::fetch::{self, json, xml};
use crate::process::{
    self,
    date_parser::{current_month, month_range, parse_yyyymm},
    Record, Table,
};
use crate::sink;

/// One request's worth of work.
#[derive(Debug, Clone)]
pub struct Unit {
    pub label: String,
    pub vars: Vars,
    /// Column and value stamped on every record this unit returns.
    pub tag: Option<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub source: String,
    pub units: usize,
    pub failed: usize,
    pub rows: usize,
    pub output: PathBuf,
}

/// The month range a run covers: settings override the source's own range.
pub fn resolve_range(spec: &SourceSpec, settings: &Settings) -> Result<(NaiveDate, NaiveDate)> {
    let start = match settings.fetch_start {
        Some(d) => d,
        None => parse_yyyymm(&spec.range.start)
            .with_context(|| format!("range start of source {}", spec.name))?,
    };
    let end = match (settings.fetch_end, spec.range.end.as_deref()) {
        (Some(d), _) => d,
        (None, Some(s)) => {
            parse_yyyymm(s).with_context(|| format!("range end of source {}", spec.name))?
        }
        (None, None) => current_month(),
    };
    if start > end {
        bail!(
            "source {}: range start {} is after end {}",
            spec.name,
            start.format("%Y%m"),
            end.format("%Y%m")
        );
    }
    Ok((start, end))
}

/// Expand the source's iteration into concrete units.
pub fn plan_units(
    spec: &SourceSpec,
    start: NaiveDate,
    end: NaiveDate,
    api_key: Option<&str>,
) -> Vec<Unit> {
    let with_key = |mut vars: Vars| {
        if let Some(key) = api_key {
            vars.set("api_key", key);
        }
        vars
    };

    match &spec.iteration {
        Iteration::Bulk => vec![Unit {
            label: format!("{}-{}", start.format("%Y%m"), end.format("%Y%m")),
            vars: with_key(Vars::for_range(start, end)),
            tag: None,
        }],
        Iteration::Codes { codes, tag_column } => codes
            .iter()
            .map(|c| {
                let mut vars = with_key(Vars::for_range(start, end));
                vars.set("code", c.code.clone());
                vars.set("item", c.item.clone().unwrap_or_default());
                Unit {
                    label: c.code.clone(),
                    vars,
                    tag: Some((tag_column.clone(), c.code.clone())),
                }
            })
            .collect(),
        Iteration::Monthly => month_range(start, end)
            .into_iter()
            .map(|m| Unit {
                label: m.format("%Y%m").to_string(),
                vars: with_key(Vars::for_range(m, m)),
                tag: None,
            })
            .collect(),
    }
}

/// The request URL for one unit: templated endpoint plus templated query.
pub fn unit_url(spec: &SourceSpec, unit: &Unit) -> Result<url::Url> {
    let endpoint = expand(&spec.endpoint, &unit.vars)?;
    let query = spec
        .query
        .iter()
        .map(|(k, v)| Ok((k.clone(), expand(v, &unit.vars)?)))
        .collect::<Result<Vec<(String, String)>>>()?;
    fetch::build_url(&endpoint, query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .with_context(|| format!("endpoint template {}", spec.endpoint))
}

/// Turn a response body into records according to the payload format.
pub fn parse_body(body: &str, format: &PayloadFormat) -> Result<Vec<Record>> {
    match format {
        PayloadFormat::Json { rows, result_code } => {
            json::extract_rows(body, rows, result_code.as_ref())
        }
        PayloadFormat::Xml { item } => {
            let payload = xml::parse_items(body, item)?;
            payload.ensure_success()?;
            Ok(payload.items)
        }
        PayloadFormat::Binary => bail!("binary payloads have no records"),
    }
}

fn tag_records(records: &mut [Record], unit: &Unit) {
    if let Some((column, value)) = &unit.tag {
        for record in records.iter_mut() {
            record.retain(|(name, _)| name != column);
            record.insert(0, (column.clone(), value.clone()));
        }
    }
}

/// Apply the failure policy to one unit's error. `Ok` means carry on.
fn on_unit_error(spec: &SourceSpec, unit: &Unit, err: anyhow::Error) -> Result<()> {
    match spec.on_error {
        FailurePolicy::FailFast => {
            Err(err.context(format!("source {} unit {}", spec.name, unit.label)))
        }
        FailurePolicy::SkipAndLog => {
            let reason = format!("{:#}", err);
            warn!(source = %spec.name, unit = %unit.label, error = %reason, "skipping unit");
            Ok(())
        }
    }
}

/// Suffix the file stem with the unit label, for binary sources that save one file per unit.
fn unit_output(output: &Path, unit: &Unit, units: usize) -> PathBuf {
    if units <= 1 {
        return output.to_path_buf();
    }
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{}_{}.{}", stem, unit.label, ext.to_string_lossy()),
        None => format!("{}_{}", stem, unit.label),
    };
    output.with_file_name(name)
}

/// Fetch, normalize and save one source.
#[instrument(level = "info", skip(client, settings, spec), fields(source = %spec.name))]
pub async fn run_source(client: &Client, settings: &Settings, spec: &SourceSpec) -> Result<RunSummary> {
    let started = Instant::now();
    let (start, end) = resolve_range(spec, settings)?;
    let api_key = spec
        .api_key_env
        .as_deref()
        .map(Settings::api_key)
        .transpose()?;
    let secrets: Vec<&str> = api_key.as_deref().into_iter().collect();
    let units = plan_units(spec, start, end, api_key.as_deref());
    let output = settings.data_dir.join(&spec.output);
    info!(
        units = units.len(),
        start = %start.format("%Y%m"),
        end = %end.format("%Y%m"),
        "starting source"
    );

    let mut failed = 0usize;
    let mut records: Vec<Record> = Vec::new();
    let mut rows = 0usize;

    for (i, unit) in units.iter().enumerate() {
        if i > 0 && spec.throttle_ms > 0 {
            sleep(Duration::from_millis(spec.throttle_ms)).await;
        }
        let url = unit_url(spec, unit)?;

        if spec.format == PayloadFormat::Binary {
            let dest = unit_output(&output, unit, units.len());
            match fetch::download_file(client, &url, &dest, &secrets).await {
                Ok(bytes) => info!(unit = %unit.label, bytes, path = %dest.display(), "saved download"),
                Err(e) => {
                    failed += 1;
                    on_unit_error(spec, unit, e)?;
                }
            }
            continue;
        }

        let fetched = match fetch::get_text(client, &url, &secrets).await {
            Ok(body) => parse_body(&body, &spec.format),
            Err(e) => Err(e),
        };
        match fetched {
            Ok(mut batch) => {
                tag_records(&mut batch, unit);
                info!(unit = %unit.label, records = batch.len(), "fetched");
                records.extend(batch);
            }
            Err(e) => {
                failed += 1;
                on_unit_error(spec, unit, e)?;
            }
        }
    }

    if spec.format != PayloadFormat::Binary {
        let table = build_table(spec, &records);
        rows = table.len();
        sink::write_csv(&table, &output)?;
    }

    info!(
        rows,
        failed,
        path = %output.display(),
        elapsed = ?started.elapsed(),
        "source done"
    );
    Ok(RunSummary {
        source: spec.name.clone(),
        units: units.len(),
        failed,
        rows,
        output,
    })
}

/// Normalize fetched records with the source's rules.
pub fn build_table(spec: &SourceSpec, records: &[Record]) -> Table {
    process::normalize(records, &spec.normalize)
}
