//! SEC identifiers: CIK normalisation and ticker to CIK lookup.
//!
//! Lookups go through SEC's `company_tickers.json`, cached under the data
//! directory and refreshed once it is older than a day.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::ScrapeError;

const CACHE_FILENAME: &str = "company_tickers.json";
const META_FILENAME: &str = "company_tickers.meta.json";
const CACHE_MAX_AGE_HOURS: i64 = 24;
pub const CIK_WIDTH: usize = 10;

#[derive(Debug, Serialize, Deserialize)]
struct TickersMeta {
    fetched_at: DateTime<Utc>,
    source_url: String,
}

#[derive(Debug, Deserialize)]
struct CompanyTicker {
    cik_str: Value,
    ticker: String,
}

/// Left-pad a CIK with zeros to ten digits.
pub fn pad_cik(raw: &str) -> Result<String> {
    let digits = raw.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ScrapeError::InvalidArgument(format!("cik must be numeric, got {:?}", raw)).into());
    }
    if digits.len() > CIK_WIDTH {
        return Err(ScrapeError::InvalidArgument(format!(
            "cik has more than {} digits: {}",
            CIK_WIDTH, raw
        ))
        .into());
    }
    Ok(format!("{:0>width$}", digits, width = CIK_WIDTH))
}

/// CIK as served by SEC JSON, which uses both numbers and strings.
pub fn cik_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// The CIK without leading zeros, as used in archive paths.
pub fn unpadded_cik(cik: &str) -> String {
    let trimmed = cik.trim().trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Find `ticker` (case-insensitive) in a `company_tickers.json` body and
/// return its padded CIK.
pub fn find_cik(body: &[u8], ticker: &str) -> Result<Option<String>> {
    let companies: HashMap<String, CompanyTicker> =
        serde_json::from_slice(body).context("Failed to parse company_tickers.json")?;

    for company in companies.values() {
        if company.ticker.eq_ignore_ascii_case(ticker.trim()) {
            let Some(cik) = cik_from_value(&company.cik_str) else {
                continue;
            };
            return pad_cik(&cik).map(Some);
        }
    }
    Ok(None)
}

fn cache_is_stale(cache_dir: &Path) -> Result<bool> {
    let meta_path = cache_dir.join(META_FILENAME);
    if !meta_path.exists() || !cache_dir.join(CACHE_FILENAME).exists() {
        return Ok(true);
    }
    let meta_bytes = fs::read(&meta_path).context("Failed to read company tickers metadata")?;
    let meta: TickersMeta = match serde_json::from_slice(&meta_bytes) {
        Ok(meta) => meta,
        Err(e) => {
            debug!("Ignoring unreadable tickers metadata: {}", e);
            return Ok(true);
        }
    };
    Ok(Utc::now() - meta.fetched_at > Duration::hours(CACHE_MAX_AGE_HOURS))
}

async fn download_tickers(client: &Client, url: &str) -> Result<Vec<u8>> {
    let resp = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .with_context(|| format!("Request to {} failed", url))?;
    if !resp.status().is_success() {
        return Err(ScrapeError::Http(format!("{} returned {}", url, resp.status())).into());
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Fresh `company_tickers.json` bytes, from cache when possible. A failed
/// refresh falls back to a stale cache if there is one.
async fn load_company_tickers(client: &Client, settings: &Settings) -> Result<Vec<u8>> {
    let cache_dir = settings.cache_path();
    let cache_path = cache_dir.join(CACHE_FILENAME);

    if !cache_is_stale(&cache_dir)? {
        debug!("Using cached {}", cache_path.display());
        return fs::read(&cache_path).context("Failed to read cached company tickers");
    }

    info!("Downloading {}", settings.sec_tickers_url);
    match download_tickers(client, &settings.sec_tickers_url).await {
        Ok(body) => {
            fs::create_dir_all(&cache_dir)
                .with_context(|| format!("Failed to create {}", cache_dir.display()))?;
            let tmp_path = cache_dir.join(format!("{}.tmp", CACHE_FILENAME));
            fs::write(&tmp_path, &body).context("Failed to write company tickers cache")?;
            fs::rename(&tmp_path, &cache_path)
                .context("Failed to finalize company tickers cache")?;

            let meta = TickersMeta {
                fetched_at: Utc::now(),
                source_url: settings.sec_tickers_url.clone(),
            };
            fs::write(cache_dir.join(META_FILENAME), serde_json::to_vec_pretty(&meta)?)
                .context("Failed to write company tickers metadata")?;
            Ok(body)
        }
        Err(err) if cache_path.exists() => {
            warn!("Failed to refresh company tickers, using stale cache: {:#}", err);
            fs::read(&cache_path).context("Failed to read cached company tickers")
        }
        Err(err) => Err(err),
    }
}

/// Resolve a ticker to its padded CIK.
pub async fn resolve_cik(client: &Client, settings: &Settings, ticker: &str) -> Result<String> {
    let body = load_company_tickers(client, settings).await?;
    match find_cik(&body, ticker)? {
        Some(cik) => {
            debug!("Resolved {} to CIK {}", ticker, cik);
            Ok(cik)
        }
        None => Err(ScrapeError::CikNotFound(ticker.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICKERS: &str = r#"{
        "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
        "1": {"cik_str": "789019", "ticker": "MSFT", "title": "MICROSOFT CORP"},
        "2": {"cik_str": 1652044, "ticker": "GOOGL", "title": "Alphabet Inc."}
    }"#;

    #[test]
    fn pads_to_ten_digits() {
        assert_eq!(pad_cik("320193").unwrap(), "0000320193");
        assert_eq!(pad_cik(" 0000320193 ").unwrap(), "0000320193");
        assert_eq!(pad_cik("1234567890").unwrap(), "1234567890");
    }

    #[test]
    fn rejects_non_numeric_or_long_cik() {
        assert!(pad_cik("").is_err());
        assert!(pad_cik("AAPL").is_err());
        assert!(pad_cik("12345678901").is_err());
    }

    #[test]
    fn unpadded_strips_zeros() {
        assert_eq!(unpadded_cik("0000320193"), "320193");
        assert_eq!(unpadded_cik("0000000000"), "0");
    }

    #[test]
    fn finds_ticker_case_insensitively() {
        assert_eq!(
            find_cik(TICKERS.as_bytes(), "aapl").unwrap(),
            Some("0000320193".to_string())
        );
        assert_eq!(
            find_cik(TICKERS.as_bytes(), "MSFT").unwrap(),
            Some("0000789019".to_string())
        );
        assert_eq!(find_cik(TICKERS.as_bytes(), "ZZZZ").unwrap(), None);
    }

    fn settings_in(dir: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.root = dir.to_path_buf();
        // Nothing listens here, so any download attempt fails fast.
        settings.sec_tickers_url = "http://127.0.0.1:9/company_tickers.json".to_string();
        settings
    }

    fn write_cache(settings: &Settings, fetched_at: DateTime<Utc>) {
        let dir = settings.cache_path();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CACHE_FILENAME), TICKERS).unwrap();
        let meta = TickersMeta {
            fetched_at,
            source_url: settings.sec_tickers_url.clone(),
        };
        fs::write(dir.join(META_FILENAME), serde_json::to_vec(&meta).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn fresh_cache_is_used_without_network() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(tmp.path());
        write_cache(&settings, Utc::now());

        let client = Client::new();
        assert_eq!(
            resolve_cik(&client, &settings, "googl").await.unwrap(),
            "0001652044"
        );
        let err = resolve_cik(&client, &settings, "NOPE").await.unwrap_err();
        assert_eq!(err.to_string(), "could not find CIK for ticker NOPE");
    }

    #[tokio::test]
    async fn stale_cache_is_used_when_refresh_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(tmp.path());
        write_cache(&settings, Utc::now() - Duration::hours(48));
        assert!(cache_is_stale(&settings.cache_path()).unwrap());

        let cik = resolve_cik(&Client::new(), &settings, "AAPL").await.unwrap();
        assert_eq!(cik, "0000320193");
    }

    #[tokio::test]
    async fn missing_cache_and_network_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(tmp.path());
        assert!(resolve_cik(&Client::new(), &settings, "AAPL").await.is_err());
    }
}
