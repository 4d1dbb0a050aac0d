use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

use crate::process::date_parser::month_end;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid")
});

/// Placeholder values for one request.
#[derive(Debug, Clone, Default)]
pub struct Vars(BTreeMap<&'static str, String>);

impl Vars {
    /// Date placeholders for the months `start..=end`:
    /// `{start}`/`{end}` as YYYYMM, `{start_date}`/`{end_date}` as YYYYMMDD
    /// (first and last day), `{start_year}`/`{end_year}`.
    pub fn for_range(start: NaiveDate, end: NaiveDate) -> Self {
        let last = month_end(end);
        let mut vars = Self::default();
        vars.set("start", start.format("%Y%m").to_string());
        vars.set("end", end.format("%Y%m").to_string());
        vars.set("start_date", start.format("%Y%m%d").to_string());
        vars.set("end_date", last.format("%Y%m%d").to_string());
        vars.set("start_year", start.year().to_string());
        vars.set("end_year", end.year().to_string());
        vars
    }

    pub fn set(&mut self, key: &'static str, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Substitute every `{name}` in `template`. An unknown name is an error.
pub fn expand(template: &str, vars: &Vars) -> Result<String> {
    let missing: Vec<&str> = PLACEHOLDER
        .captures_iter(template)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|name| vars.get(name).is_none())
        .collect();
    if !missing.is_empty() {
        bail!("unknown placeholder(s) {:?} in {:?}", missing, template);
    }
    Ok(PLACEHOLDER
        .replace_all(template, |c: &Captures| {
            vars.get(&c[1]).unwrap_or_default().to_string()
        })
        .into_owned())
}
