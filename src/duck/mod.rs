use anyhow::{Context, Result};
use duckdb::{params, params_from_iter, Connection};
use glob::{glob, Pattern};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{debug, error, info, instrument};

use crate::config::FailurePolicy;
use crate::process::{table::Table, utils::snake_ident};
use crate::sink::read_csv;

/// Column recording which domain directory a row came from.
pub const DOMAIN_COLUMN: &str = "domain";
/// Column recording the CSV file stem a row was loaded from.
pub const FILE_SOURCE_COLUMN: &str = "file_source";

/// Open a DuckDB database on disk at `path`, creating the file (and its directory) if needed.
pub fn open_disk_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    Connection::open(path).with_context(|| format!("opening DuckDB at {}", path.display()))
}

/// Open a DuckDB in‐memory database
pub fn open_mem_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    Ok(conn)
}

/// `economy` + `confidence` → `economy_confidence`; `Global-Trade` + `export-volume` → `global_trade_export_volume`.
pub fn table_name(domain: &str, stem: &str) -> String {
    snake_ident(&format!("{}_{}", domain, stem))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// One CSV found under the loader root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvFile {
    pub domain: String,
    pub stem: String,
    pub path: PathBuf,
}

impl CsvFile {
    pub fn table_name(&self) -> String {
        table_name(&self.domain, &self.stem)
    }
}

/// Every `<root>/<domain>/*.csv`, sorted by path.
pub fn discover(root: &Path) -> Result<Vec<CsvFile>> {
    let pattern = format!("{}/*/*.csv", Pattern::escape(&root.to_string_lossy()));
    let mut files = Vec::new();
    for entry in glob(&pattern)? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        let domain = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|s| s.to_string_lossy().to_string());
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string());
        if let (Some(domain), Some(stem)) = (domain, stem) {
            files.push(CsvFile { domain, stem, path });
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Create (or replace) `name` with one VARCHAR column per header and insert every row.
pub fn replace_table(conn: &Connection, name: &str, table: &Table) -> Result<()> {
    let columns: Vec<String> = table
        .headers
        .iter()
        .map(|h| format!("{} VARCHAR", quote_ident(h)))
        .collect();
    let ident = quote_ident(name);

    conn.execute_batch("BEGIN TRANSACTION;")?;
    let result = (|| -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE OR REPLACE TABLE {} ({});",
            ident,
            columns.join(", ")
        ))
        .with_context(|| format!("creating table {}", name))?;

        let placeholders = vec!["?"; table.headers.len()].join(", ");
        let mut stmt = conn.prepare(&format!("INSERT INTO {} VALUES ({})", ident, placeholders))?;
        for row in &table.rows {
            stmt.execute(params_from_iter(row.iter()))
                .with_context(|| format!("inserting into {}", name))?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT;")?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

/// Load one CSV with its `domain` / `file_source` columns. Returns the row count.
#[instrument(level = "debug", skip(conn, file), fields(path = %file.path.display()))]
pub fn load_file(conn: &Connection, file: &CsvFile) -> Result<usize> {
    let mut table = read_csv(&file.path)?;
    table.drop_columns(&[DOMAIN_COLUMN, FILE_SOURCE_COLUMN]);
    table.add_constant_column(DOMAIN_COLUMN, &file.domain);
    table.add_constant_column(FILE_SOURCE_COLUMN, &file.stem);

    let name = file.table_name();
    replace_table(conn, &name, &table)?;
    debug!(table = %name, rows = table.len(), "replaced table");
    Ok(table.len())
}

#[derive(Debug, Default)]
pub struct LoadSummary {
    /// (table name, rows)
    pub loaded: Vec<(String, usize)>,
    /// (file, error)
    pub failed: Vec<(PathBuf, String)>,
}

/// Load every CSV under `root`; a failing file is handled per `policy`.
#[instrument(level = "info", skip(conn), fields(root = %root.display()))]
pub fn load_directory(conn: &Connection, root: &Path, policy: FailurePolicy) -> Result<LoadSummary> {
    let start = Instant::now();
    let files = discover(root)?;
    info!(files = files.len(), "discovered CSV files");

    let mut summary = LoadSummary::default();
    for file in &files {
        match load_file(conn, file) {
            Ok(rows) => {
                info!(table = %file.table_name(), rows, "loaded");
                summary.loaded.push((file.table_name(), rows));
            }
            Err(e) => match policy {
                FailurePolicy::FailFast => {
                    return Err(e.context(format!("loading {}", file.path.display())))
                }
                FailurePolicy::SkipAndLog => {
                    error!(file = %file.path.display(), "load failed: {:#}", e);
                    summary.failed.push((file.path.clone(), format!("{:#}", e)));
                }
            },
        }
    }

    info!(
        loaded = summary.loaded.len(),
        failed = summary.failed.len(),
        elapsed = ?start.elapsed(),
        "load complete"
    );
    Ok(summary)
}

/// Number of tables called `name`; used to check replace semantics.
pub fn table_count(conn: &Connection, name: &str) -> Result<i64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
        params![name],
        |r| r.get(0),
    )?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::write_csv;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, headers: &[&str], rows: &[&[&str]]) -> PathBuf {
        let path = root.join(rel);
        let table = Table {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        };
        write_csv(&table, &path).unwrap();
        path
    }

    #[test]
    fn table_names_are_snake_case() {
        assert_eq!(table_name("economy", "confidence"), "economy_confidence");
        assert_eq!(
            table_name("Global-Trade", "Export-Volume"),
            "global_trade_export_volume"
        );
    }

    #[test]
    fn loads_with_domain_columns_and_replaces_on_rerun() -> Result<()> {
        let tmp = tempdir()?;
        let root = tmp.path().join("processed");
        write(
            &root,
            "economy/confidence.csv",
            &["date", "지수"],
            &[&["2024-01", "98.1"], &["2024-02", "99.0"]],
        );

        let conn = open_mem_db()?;
        let first = load_directory(&conn, &root, FailurePolicy::SkipAndLog)?;
        assert_eq!(first.loaded, vec![("economy_confidence".to_string(), 2)]);

        let second = load_directory(&conn, &root, FailurePolicy::SkipAndLog)?;
        assert_eq!(second.loaded.len(), 1);
        assert_eq!(table_count(&conn, "economy_confidence")?, 1);

        let rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM economy_confidence", [], |r| r.get(0))?;
        assert_eq!(rows, 2);

        let (domain, source, value): (String, String, String) = conn.query_row(
            "SELECT domain, file_source, \"지수\" FROM economy_confidence ORDER BY \"date\" LIMIT 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;
        assert_eq!(domain, "economy");
        assert_eq!(source, "confidence");
        assert_eq!(value, "98.1");
        Ok(())
    }

    #[test]
    fn bad_file_is_skipped_and_others_load() -> Result<()> {
        let tmp = tempdir()?;
        let root = tmp.path();
        write(root, "energy/power.csv", &["date", "value"], &[&["2024-01", "1"]]);
        // duplicate header names cannot become a table
        write(root, "energy/broken.csv", &["a", "a"], &[&["1", "2"]]);
        fs::write(root.join("energy/notes.txt"), "ignored")?;

        let conn = open_mem_db()?;
        let summary = load_directory(&conn, root, FailurePolicy::SkipAndLog)?;
        assert_eq!(summary.loaded, vec![("energy_power".to_string(), 1)]);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].0.ends_with("broken.csv"));

        assert!(load_directory(&conn, root, FailurePolicy::FailFast).is_err());
        Ok(())
    }

    #[test]
    fn row_wider_than_header_is_skipped() -> Result<()> {
        let tmp = tempdir()?;
        let root = tmp.path();
        write(root, "economy/rates.csv", &["date", "value"], &[&["2024-01", "3.5"]]);
        fs::write(root.join("economy/ragged.csv"), "a,b\n1,2,3\n")?;

        let conn = open_mem_db()?;
        let summary = load_directory(&conn, root, FailurePolicy::SkipAndLog)?;
        assert_eq!(summary.loaded, vec![("economy_rates".to_string(), 1)]);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].0.ends_with("ragged.csv"));
        assert_eq!(table_count(&conn, "economy_ragged")?, 0);
        Ok(())
    }

    #[test]
    fn disk_database_persists() -> Result<()> {
        let tmp = tempdir()?;
        let root = tmp.path().join("processed");
        write(&root, "defence/contracts.csv", &["id"], &[&["1"], &["2"], &["3"]]);
        let db_path = tmp.path().join("db/warehouse.duckdb");
        {
            let conn = open_disk_db(&db_path)?;
            load_directory(&conn, &root, FailurePolicy::FailFast)?;
        }
        let conn = open_disk_db(&db_path)?;
        let rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM defence_contracts", [], |r| r.get(0))?;
        assert_eq!(rows, 3);
        Ok(())
    }
}
