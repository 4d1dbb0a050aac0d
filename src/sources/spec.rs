use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::FailurePolicy;
use crate::fetch::json::ResultCode;
use crate::process::Normalization;

/// How a response body turns into records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadFormat {
    /// JSON document; `rows` is the JSON pointer of the row array (`""` for the root).
    Json {
        rows: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result_code: Option<ResultCode>,
    },
    /// XML document; every element named `item` is one record.
    Xml {
        #[serde(default = "default_item_tag")]
        item: String,
    },
    /// Save the body untouched (spreadsheet exports).
    Binary,
}

fn default_item_tag() -> String {
    "item".to_string()
}

/// A statistic code queried on its own. `item` fills the `{item}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatCode {
    pub code: String,
    #[serde(default)]
    pub item: Option<String>,
}

/// The unit of iteration: what one request covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Iteration {
    /// One request for the whole range.
    Bulk,
    /// One request per code; each record gets the code in `tag_column`.
    Codes {
        codes: Vec<StatCode>,
        #[serde(default = "default_tag_column")]
        tag_column: String,
    },
    /// One request per calendar month of the range.
    Monthly,
}

fn default_tag_column() -> String {
    "source_code".to_string()
}

/// Months as `YYYYMM`; a missing end means the current month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

/// One row of the source table: where to fetch, how to reshape, where to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub endpoint: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    pub format: PayloadFormat,
    #[serde(default)]
    pub api_key_env: Option<String>,
    pub iteration: Iteration,
    pub range: RangeSpec,
    #[serde(flatten)]
    pub normalize: Normalization,
    #[serde(default)]
    pub throttle_ms: u64,
    #[serde(default)]
    pub on_error: FailurePolicy,
    /// Relative to the data directory.
    pub output: String,
}
