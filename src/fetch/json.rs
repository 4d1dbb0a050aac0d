use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::process::table::Record;

/// Render a JSON value as a table cell.
pub fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Where a JSON API reports its own result code, and which codes are not errors.
///
/// A body without a code is read normally. A code listed in `empty` means
/// "no data"; one listed in `ok` means rows follow. Any other code fails the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCode {
    /// JSON pointer of the code, e.g. `/RESULT/CODE`.
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub ok: Vec<String>,
    #[serde(default)]
    pub empty: Vec<String>,
}

enum Outcome {
    Rows,
    Empty,
}

impl ResultCode {
    fn check(&self, doc: &Value) -> Result<Outcome> {
        let Some(code) = doc.pointer(&self.code).map(cell) else {
            return Ok(Outcome::Rows);
        };
        if self.empty.contains(&code) {
            debug!(code = %code, "API reported no data");
            return Ok(Outcome::Empty);
        }
        if self.ok.contains(&code) {
            return Ok(Outcome::Rows);
        }
        let message = self
            .message
            .as_deref()
            .and_then(|p| doc.pointer(p))
            .map(cell)
            .unwrap_or_else(|| "no message".to_string());
        bail!("API error {}: {}", code, message)
    }
}

/// Pull the row list at `pointer` (RFC 6901, `""` is the document root) out of `body`.
///
/// The result code, when given, is checked first. A pointer that resolves to
/// nothing is an empty result. Anything other than an array of objects is an error.
pub fn extract_rows(body: &str, pointer: &str, result: Option<&ResultCode>) -> Result<Vec<Record>> {
    let doc: Value = serde_json::from_str(body).context("response is not valid JSON")?;
    if let Some(result) = result {
        if let Outcome::Empty = result.check(&doc)? {
            return Ok(Vec::new());
        }
    }
    let Some(rows) = doc.pointer(pointer) else {
        debug!(pointer, "row pointer not present; treating as empty");
        return Ok(Vec::new());
    };
    let rows = rows
        .as_array()
        .ok_or_else(|| anyhow!("value at {:?} is not an array", pointer))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let obj = row
                .as_object()
                .ok_or_else(|| anyhow!("row {} at {:?} is not an object", i, pointer))?;
            Ok(obj.iter().map(|(k, v)| (k.clone(), cell(v))).collect())
        })
        .collect()
}
