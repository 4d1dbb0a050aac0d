// src/process/mod.rs
pub mod date_parser;
pub mod normalize;
pub mod table;
pub mod utils;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub use normalize::{DateColumn, Predicate, RenameRule, RowFilter};
pub use table::{Record, Table};

/// The reshaping a source applies to its fetched records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalization {
    /// Output columns that lead the table; also the header of an empty result.
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    #[serde(default)]
    pub rename: Vec<RenameRule>,
    #[serde(default)]
    pub filter: Option<RowFilter>,
    #[serde(default)]
    pub date_column: Option<DateColumn>,
}

/// Assemble → drop → rename → filter → derive date → reorder.
#[instrument(level = "debug", skip_all, fields(records = records.len()))]
pub fn normalize(records: &[Record], spec: &Normalization) -> Table {
    let mut table = Table::from_records(records, &spec.columns);
    table.drop_columns(&spec.drop_columns);

    for rule in &spec.rename {
        normalize::apply_rename(&mut table, rule);
    }
    if let Some(filter) = &spec.filter {
        let removed = normalize::apply_filter(&mut table, filter);
        debug!(removed, column = %filter.column, "filtered rows");
    }
    if let Some(date) = &spec.date_column {
        normalize::apply_date_column(&mut table, date);
    }
    table.reorder(&spec.columns);
    table
}
