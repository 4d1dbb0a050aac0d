use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use tokio::fs;
use url::Url;

use super::request::get_bytes;

/// Download `url` and save the body as-is at `dest`, creating parent directories.
/// Returns the number of bytes written.
pub async fn download_file(
    client: &Client,
    url: &Url,
    dest: impl AsRef<Path>,
    secrets: &[&str],
) -> Result<u64> {
    let dest = dest.as_ref();
    let bytes = get_bytes(client, url, secrets).await?;
    save_bytes(dest, &bytes).await?;
    Ok(bytes.len() as u64)
}

/// Write `bytes` to `dest`, creating parent directories.
pub async fn save_bytes(dest: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(dest, bytes)
        .await
        .with_context(|| format!("writing {}", dest.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn save_bytes_creates_parents() {
        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("raw/energy/petronet.xls");
        let body = [0xD0u8, 0xCF, 0x11, 0xE0, 0x00, 0xFF];
        save_bytes(&dest, &body).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }
}
