use anyhow::{Context, Result};
use std::{collections::BTreeMap, fs, io::ErrorKind, path::Path};
use tracing::{info, warn};

use crate::process::utils::snake_ident;

/// Sectors that may carry a hand-written insight note.
pub const SECTORS: [&str; 7] = [
    "Agriculture",
    "Defence",
    "Economy",
    "Energy",
    "Industry",
    "Global Trade",
    "Korea Trade",
];

/// `"Global Trade"` → `global_trade_insight.txt`
pub fn insight_file_name(sector: &str) -> String {
    format!("{}_insight.txt", snake_ident(sector))
}

/// Read every sector's insight text from `dir`, keyed by sector name.
///
/// A sector without a file is logged and left out. Any other read error is returned.
pub fn load_insights(dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut insights = BTreeMap::new();
    for sector in SECTORS {
        let path = dir.join(insight_file_name(sector));
        match fs::read_to_string(&path) {
            Ok(text) => {
                insights.insert(sector.to_string(), text);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(sector, path = %path.display(), "no insight file");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        }
    }
    info!(loaded = insights.len(), dir = %dir.display(), "loaded insights");
    Ok(insights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_names() {
        assert_eq!(insight_file_name("Defence"), "defence_insight.txt");
        assert_eq!(insight_file_name("Korea Trade"), "korea_trade_insight.txt");
    }

    #[test]
    fn missing_sectors_are_omitted() -> Result<()> {
        let tmp = tempdir()?;
        fs::write(tmp.path().join("economy_insight.txt"), "금리 동결 전망")?;
        fs::write(tmp.path().join("energy_insight.txt"), "LNG imports rising")?;
        fs::write(tmp.path().join("notes.txt"), "not a sector")?;

        let insights = load_insights(tmp.path())?;
        assert_eq!(insights.len(), 2);
        assert_eq!(insights["Economy"], "금리 동결 전망");
        assert_eq!(insights["Energy"], "LNG imports rising");
        Ok(())
    }

    #[test]
    fn missing_directory_yields_empty_map() -> Result<()> {
        let tmp = tempdir()?;
        let insights = load_insights(&tmp.path().join("absent"))?;
        assert!(insights.is_empty());
        Ok(())
    }

    #[test]
    fn unreadable_file_is_an_error() -> Result<()> {
        let tmp = tempdir()?;
        // a directory where the file should be
        fs::create_dir(tmp.path().join("defence_insight.txt"))?;
        assert!(load_insights(tmp.path()).is_err());
        Ok(())
    }
}
