use anyhow::{Context, Result};
use lopdf::Document;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::sink::write_text;

/// Separator placed between consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Raw text of every page, in page order, joined with a blank line.
///
/// A page whose text cannot be decoded contributes an empty string and a warning;
/// a document that cannot be opened is an error.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let doc = Document::load(path).with_context(|| format!("opening PDF {}", path.display()))?;

    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for &number in pages.keys() {
        match doc.extract_text(&[number]) {
            Ok(text) => {
                debug!(page = number, chars = text.len(), "extracted page");
                texts.push(text);
            }
            Err(e) => {
                warn!(page = number, error = %e, "could not extract page text");
                texts.push(String::new());
            }
        }
    }
    info!(pages = texts.len(), "extracted PDF text");
    Ok(texts.join(PAGE_SEPARATOR))
}

/// Extract `input` and write the text to `output` as UTF-8. Returns the character count.
pub fn extract_to_file(input: &Path, output: &Path) -> Result<usize> {
    let text = extract_text(input)?;
    write_text(&text, output)?;
    Ok(text.chars().count())
}
