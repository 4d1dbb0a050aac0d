use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::{form_urlencoded, Url};

/// One shared client per run, with a cookie store and the configured timeout.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .cookie_store(true)
        .build()
        .context("building HTTP client")
}

/// Join an endpoint and its query parameters. Parameters already in the
/// endpoint are kept; `params` are appended after them.
pub fn build_url<'a, I>(endpoint: &str, params: I) -> Result<Url>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    // the endpoint may carry a key in its path, so it stays out of the error
    let mut url = Url::parse(endpoint).context("parsing endpoint URL")?;
    let mut params = params.into_iter().peekable();
    if params.peek().is_some() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

/// GET `url` and return the body; a non-success status is an error.
///
/// `secrets` are masked wherever the URL shows up in logs or errors.
pub async fn get_text(client: &Client, url: &Url, secrets: &[&str]) -> Result<String> {
    let shown = redact(url, secrets);
    debug!("Fetching text from {}", shown);
    client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| e.without_url())
        .with_context(|| format!("GET {} failed", shown))?
        .error_for_status()
        .map_err(|e| e.without_url())
        .with_context(|| format!("Non-success status {}", shown))?
        .text()
        .await
        .map_err(|e| e.without_url())
        .with_context(|| format!("Reading text from {}", shown))
}

/// GET `url` and return the raw body bytes.
pub async fn get_bytes(client: &Client, url: &Url, secrets: &[&str]) -> Result<Vec<u8>> {
    let shown = redact(url, secrets);
    debug!("Fetching bytes from {}", shown);
    let resp = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| e.without_url())
        .with_context(|| format!("GET {} failed", shown))?
        .error_for_status()
        .map_err(|e| e.without_url())
        .with_context(|| format!("Non-success status {}", shown))?;
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| e.without_url())
        .with_context(|| format!("Reading body from {}", shown))?;
    Ok(bytes.to_vec())
}

/// The URL for logs: query values under a `key`/`token` name are masked, and so
/// is every occurrence of a known secret, including one embedded in the path.
pub fn redact(url: &Url, secrets: &[&str]) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let lower = k.to_lowercase();
            if lower.contains("key") || lower.contains("token") {
                (k.into_owned(), "***".to_string())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();
    if !pairs.is_empty() {
        shown.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let mut text = shown.to_string();
    for secret in secrets.iter().filter(|s| !s.is_empty()) {
        let encoded: String = form_urlencoded::byte_serialize(secret.as_bytes()).collect();
        text = text.replace(*secret, "***").replace(&encoded, "***");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_appends_params() {
        let url = build_url(
            "https://apis.data.go.kr/svc/getList?type=xml",
            [("serviceKey", "abc"), ("pageNo", "1")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://apis.data.go.kr/svc/getList?type=xml&serviceKey=abc&pageNo=1"
        );

        let bare = build_url("https://api.iea.org/stats", [] as [(&str, &str); 0]).unwrap();
        assert_eq!(bare.as_str(), "https://api.iea.org/stats");
    }

    #[test]
    fn redact_masks_keys() {
        let url = Url::parse("https://x.test/a?serviceKey=secret&numOfRows=10").unwrap();
        let shown = redact(&url, &[]);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("numOfRows=10"));
    }

    #[test]
    fn redact_masks_key_in_path() {
        let url = Url::parse(
            "https://ecos.bok.or.kr/api/StatisticSearch/ABC123XYZ/json/kr/1/10/722Y001/M/202401/202402",
        )
        .unwrap();
        let shown = redact(&url, &["ABC123XYZ"]);
        assert!(!shown.contains("ABC123XYZ"));
        assert!(shown.contains("/StatisticSearch/***/json/"));

        // base64-style keys appear form-encoded in the query
        let url = build_url("https://x.test/a", [("auth", "a+b/c==")]).unwrap();
        assert!(!redact(&url, &["a+b/c=="]).contains("a%2Bb"));
        assert_eq!(redact(&url, &[""]), url.as_str());
    }
}
