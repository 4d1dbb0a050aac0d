use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::process::table::Table;

/// UTF-8 byte-order mark written at the start of every CSV.
pub const UTF8_BOM: &str = "\u{feff}";

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

/// Write `table` as BOM-prefixed UTF-8 CSV, header first.
///
/// The file is written to a temp sibling and renamed over `path`.
pub fn write_csv(table: &Table, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let tmp = tmp_path(path);
    {
        let mut file =
            fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        file.write_all(UTF8_BOM.as_bytes())?;
        let mut wtr = WriterBuilder::new().from_writer(file);
        wtr.write_record(&table.headers)
            .with_context(|| format!("writing header to {}", tmp.display()))?;
        for row in &table.rows {
            wtr.write_record(row)
                .with_context(|| format!("writing row to {}", tmp.display()))?;
        }
        wtr.flush()?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Read a CSV file with a header row into a table. A leading BOM is dropped.
///
/// Short rows are padded with empty cells; a row longer than the header is an error.
pub fn read_csv(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(&text);

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result
            .with_context(|| format!("CSV parse error in {} at record {}", path.display(), idx))?;
        if record.len() > headers.len() {
            bail!(
                "{}: record {} has {} fields but the header has {}",
                path.display(),
                idx,
                record.len(),
                headers.len()
            );
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok(Table { headers, rows })
}

/// Write plain UTF-8 text, creating parent directories.
pub fn write_text(text: &str, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}
