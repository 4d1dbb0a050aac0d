use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::process::date_parser::format_year_month;
use crate::process::table::Table;

/// Replace category codes in `column` with readable labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRule {
    pub column: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    Equals(String),
    Contains(String),
    OneOf(Vec<String>),
}

impl Predicate {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Predicate::Equals(v) => value == v,
            Predicate::Contains(v) => value.contains(v.as_str()),
            Predicate::OneOf(vs) => vs.iter().any(|v| v == value),
        }
    }
}

/// Keep (or drop, with `keep: false`) the rows whose `column` matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub matches: Predicate,
    #[serde(default = "default_keep")]
    pub keep: bool,
}

fn default_keep() -> bool {
    true
}

/// Build `target` from a year column and a month column, then remove both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateColumn {
    pub year: String,
    pub month: String,
    pub target: String,
    #[serde(default = "default_date_format")]
    pub format: String,
}

fn default_date_format() -> String {
    "%Y-%m".to_string()
}

/// Every occurrence of a mapped code is replaced; unmapped values pass through.
pub fn apply_rename(table: &mut Table, rule: &RenameRule) {
    let Some(idx) = table.column_index(&rule.column) else {
        debug!(column = %rule.column, "rename column absent, skipping");
        return;
    };
    for row in &mut table.rows {
        if let Some(label) = rule.labels.get(&row[idx]) {
            row[idx] = label.clone();
        }
    }
}

/// Returns the number of rows removed.
///
/// A filter on a column the table lacks removes every row when `keep` is set,
/// since no row can match.
pub fn apply_filter(table: &mut Table, filter: &RowFilter) -> usize {
    let before = table.rows.len();
    match table.column_index(&filter.column) {
        Some(idx) => table
            .rows
            .retain(|row| filter.matches.matches(&row[idx]) == filter.keep),
        None => {
            warn!(column = %filter.column, "filter column absent");
            if filter.keep {
                table.rows.clear();
            }
        }
    }
    before - table.rows.len()
}

/// Derive the formatted date column. Rows whose year/month cells do not parse
/// get an empty date. If `target` is already a column (e.g. a declared one) it is
/// filled in place, otherwise the new column takes the year column's position.
pub fn apply_date_column(table: &mut Table, spec: &DateColumn) {
    let (Some(y), Some(m)) = (
        table.column_index(&spec.year),
        table.column_index(&spec.month),
    ) else {
        debug!(year = %spec.year, month = %spec.month, "date source columns absent");
        return;
    };
    let existing = table.column_index(&spec.target).filter(|&t| t != m);
    let dest = existing.unwrap_or(y);

    let mut unparsed = 0usize;
    for row in &mut table.rows {
        let formatted = format_year_month(&row[y], &row[m], &spec.format).unwrap_or_else(|| {
            unparsed += 1;
            String::new()
        });
        row[dest] = formatted;
    }
    if unparsed > 0 {
        warn!(unparsed, target = %spec.target, "rows with unparseable year/month");
    }

    // by position: `target` may share a name with the month column
    match existing {
        Some(t) if t != y => table.drop_indices(&[y, m]),
        _ => {
            table.headers[y] = spec.target.clone();
            table.drop_indices(&[m]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::table::Record;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        let records: Vec<Record> = rows
            .iter()
            .map(|r| {
                headers
                    .iter()
                    .zip(r.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect()
            })
            .collect();
        Table::from_records(&records, &[])
    }

    #[test]
    fn rename_replaces_mapped_codes_only() {
        let mut t = table(
            &["product", "value"],
            &[&["COAL", "1"], &["NUCLEAR", "2"], &["PEAT", "3"], &["COAL", "4"]],
        );
        let rule = RenameRule {
            column: "product".into(),
            labels: [("COAL", "Coal"), ("NUCLEAR", "Nuclear")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        apply_rename(&mut t, &rule);
        assert_eq!(
            t.column("product").unwrap(),
            vec!["Coal", "Nuclear", "PEAT", "Coal"]
        );
    }

    #[test]
    fn filter_polarity() {
        let rows: &[&[&str]] = &[
            &["국방부", "1"],
            &["조달청", "2"],
            &["국방과학연구소", "3"],
        ];
        let mut kept = table(&["dminsttNm", "amount"], rows);
        let removed = apply_filter(
            &mut kept,
            &RowFilter {
                column: "dminsttNm".into(),
                matches: Predicate::Contains("국방".into()),
                keep: true,
            },
        );
        assert_eq!(removed, 1);
        assert_eq!(kept.column("amount").unwrap(), vec!["1", "3"]);

        let mut dropped = table(&["dminsttNm", "amount"], rows);
        apply_filter(
            &mut dropped,
            &RowFilter {
                column: "dminsttNm".into(),
                matches: Predicate::OneOf(vec!["국방부".into(), "조달청".into()]),
                keep: false,
            },
        );
        assert_eq!(dropped.column("amount").unwrap(), vec!["3"]);
    }

    #[test]
    fn date_column_replaces_year_and_month() {
        let mut t = table(
            &["year", "month", "value"],
            &[&["2024", "3", "10"], &["2024", "x", "11"]],
        );
        apply_date_column(
            &mut t,
            &DateColumn {
                year: "year".into(),
                month: "month".into(),
                target: "date".into(),
                format: "%Y-%m".into(),
            },
        );
        assert_eq!(t.headers, vec!["date", "value"]);
        assert_eq!(t.rows[0], vec!["2024-03", "10"]);
        assert_eq!(t.rows[1], vec!["", "11"]);
    }

    #[test]
    fn date_column_may_reuse_the_month_name() {
        let mut t = table(&["year", "month", "value"], &[&["2023", "11", "7"]]);
        apply_date_column(
            &mut t,
            &DateColumn {
                year: "year".into(),
                month: "month".into(),
                target: "month".into(),
                format: "%Y-%m".into(),
            },
        );
        assert_eq!(t.headers, vec!["month", "value"]);
        assert_eq!(t.rows[0], vec!["2023-11", "7"]);
    }

    #[test]
    fn predicate_deserializes_from_yaml() {
        let f: RowFilter =
            serde_yaml::from_str("column: kind\nmatches:\n  op: equals\n  value: goods\n").unwrap();
        assert!(f.keep);
        assert_eq!(f.matches, Predicate::Equals("goods".into()));
    }
}
