// src/config.rs
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf, time::Duration};

use crate::process::date_parser::parse_yyyymm;

/// What to do when one unit of work (a request, a file) fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole run with the error.
    FailFast,
    /// Log a warning and move on to the next unit.
    #[default]
    SkipAndLog,
}

impl FailurePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fail_fast" | "fail" => Some(FailurePolicy::FailFast),
            "skip_and_log" | "skip" => Some(FailurePolicy::SkipAndLog),
            _ => None,
        }
    }
}

/// Runtime settings, read from the environment. Every path has a relative default.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub duckdb_path: PathBuf,
    pub insights_dir: PathBuf,
    pub pdf_input: PathBuf,
    pub pdf_output: PathBuf,
    pub dashboard: DashboardSettings,
    pub sources_file: Option<PathBuf>,
    pub fetch_start: Option<NaiveDate>,
    pub fetch_end: Option<NaiveDate>,
    pub http_timeout: Duration,
    pub loader_on_error: FailurePolicy,
}

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub command: String,
    pub app: PathBuf,
    pub port: u16,
    pub address: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            command: "streamlit".to_string(),
            app: PathBuf::from("dashboard/app.py"),
            port: 8501,
            address: "0.0.0.0".to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let path_or = |key: &str, default: PathBuf| get(key).map(PathBuf::from).unwrap_or(default);

        let data_dir = path_or("DATA_DIR", PathBuf::from("data"));
        let month = |key: &str| -> Result<Option<NaiveDate>> {
            get(key)
                .map(|v| parse_yyyymm(&v).with_context(|| format!("parsing {}", key)))
                .transpose()
        };

        let defaults = DashboardSettings::default();
        let dashboard = DashboardSettings {
            command: get("DASHBOARD_COMMAND").unwrap_or(defaults.command),
            app: path_or("DASHBOARD_APP", defaults.app),
            port: get("DASHBOARD_PORT")
                .map(|v| v.parse().context("parsing DASHBOARD_PORT"))
                .transpose()?
                .unwrap_or(defaults.port),
            address: get("DASHBOARD_ADDRESS").unwrap_or(defaults.address),
        };

        let timeout_secs: u64 = get("HTTP_TIMEOUT_SECS")
            .map(|v| v.parse().context("parsing HTTP_TIMEOUT_SECS"))
            .transpose()?
            .unwrap_or(30);

        let loader_on_error = match get("LOADER_ON_ERROR") {
            Some(v) => FailurePolicy::parse(&v)
                .with_context(|| format!("LOADER_ON_ERROR must be fail_fast or skip_and_log, got {:?}", v))?,
            None => FailurePolicy::SkipAndLog,
        };

        Ok(Self {
            processed_dir: path_or("PROCESSED_DIR", data_dir.join("processed")),
            duckdb_path: path_or("DUCKDB_PATH", data_dir.join("warehouse.duckdb")),
            insights_dir: path_or("INSIGHTS_DIR", PathBuf::from("insights")),
            pdf_input: path_or("PDF_INPUT", PathBuf::from("reports/report.pdf")),
            pdf_output: path_or("PDF_OUTPUT", data_dir.join("raw").join("report.txt")),
            dashboard,
            sources_file: get("SOURCES_FILE").map(PathBuf::from),
            fetch_start: month("FETCH_START")?,
            fetch_end: month("FETCH_END")?,
            http_timeout: Duration::from_secs(timeout_secs),
            loader_on_error,
            data_dir,
        })
    }

    /// Read an API key from the variable named by a source.
    pub fn api_key(var: &str) -> Result<String> {
        env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("environment variable {} is not set", var))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_are_relative_to_data_dir() {
        let s = settings(&[("DATA_DIR", "/srv/stats")]).unwrap();
        assert_eq!(s.processed_dir, PathBuf::from("/srv/stats/processed"));
        assert_eq!(s.duckdb_path, PathBuf::from("/srv/stats/warehouse.duckdb"));
        assert_eq!(s.insights_dir, PathBuf::from("insights"));
        assert_eq!(s.dashboard.port, 8501);
        assert_eq!(s.http_timeout, Duration::from_secs(30));
        assert_eq!(s.loader_on_error, FailurePolicy::SkipAndLog);
        assert!(s.fetch_start.is_none());
    }

    #[test]
    fn overrides_and_bad_values() {
        let s = settings(&[
            ("FETCH_START", "202301"),
            ("DASHBOARD_PORT", "9000"),
            ("LOADER_ON_ERROR", "fail-fast"),
            ("INSIGHTS_DIR", "  "),
        ])
        .unwrap();
        assert_eq!(s.fetch_start, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(s.dashboard.port, 9000);
        assert_eq!(s.loader_on_error, FailurePolicy::FailFast);
        assert_eq!(s.insights_dir, PathBuf::from("insights"));

        assert!(settings(&[("FETCH_END", "2023")]).is_err());
        assert!(settings(&[("LOADER_ON_ERROR", "maybe")]).is_err());
    }
}
