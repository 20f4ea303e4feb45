//! Internal command representation
//!
//! The clap layer converts parsed arguments into [`Command`] values; the
//! dispatcher only ever sees these, with `key=value` pairs already split.

use anyhow::Result;
use std::path::PathBuf;

use crate::error::ScrapeError;
use crate::pricing::{PriceInterval, PricePeriod};
use crate::spiders::JobArgs;

/// Parsed command ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Run one job: `crawl <job> [-a k=v]... [-s K=V]...`
    Crawl {
        job: String,
        args: JobArgs,
        overrides: Vec<(String, String)>,
    },
    /// List jobs: `list`
    List,
    /// Create a project: `init [DIR]`
    Init { dir: PathBuf },
    /// Runbook for one ticker: `run --ticker T [--cik C] [--limit N]`
    Run {
        ticker: String,
        cik: Option<String>,
        limit: Option<usize>,
    },
    /// Stored data for one ticker: `show TICKER [--period P] [--interval I]`
    Show { ticker: String, options: ShowOptions },
    /// Warehouse overview: `db status`
    DbStatus,
}

/// What `show` adds on top of the stored rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShowOptions {
    pub period: PricePeriod,
    pub interval: PriceInterval,
    /// Fetch the price history.
    pub prices: bool,
    /// Ask the model for actionable insights.
    pub insights: bool,
}

impl Default for ShowOptions {
    fn default() -> Self {
        Self {
            period: PricePeriod::SixMonths,
            interval: PriceInterval::Daily,
            prices: true,
            insights: false,
        }
    }
}

/// Split `key=value` at the first `=`. Keys are trimmed and must not be empty;
/// values are kept as given.
pub fn parse_key_value(raw: &str) -> Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(
            ScrapeError::InvalidArgument(format!("expected key=value, got {:?}", raw)).into(),
        );
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(
            ScrapeError::InvalidArgument(format!("empty key in {:?}", raw)).into(),
        );
    }
    Ok((key.to_string(), value.to_string()))
}

/// `-a` pairs as job arguments; a repeated key keeps the last value.
pub fn parse_job_args(raw: &[String]) -> Result<JobArgs> {
    let mut args = JobArgs::new();
    for pair in raw {
        let (key, value) = parse_key_value(pair)?;
        args.insert(key, value);
    }
    Ok(args)
}

/// `-s` pairs as ordered setting overrides. Keys are matched upper case.
pub fn parse_overrides(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|pair| {
            let (key, value) = parse_key_value(pair)?;
            Ok((key.to_ascii_uppercase(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value_splits_at_first_equals() {
        assert_eq!(
            parse_key_value("cik=320193").unwrap(),
            ("cik".to_string(), "320193".to_string())
        );
        assert_eq!(
            parse_key_value("USER_AGENT=a=b").unwrap(),
            ("USER_AGENT".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_key_value(" ticker =").unwrap(),
            ("ticker".to_string(), String::new())
        );
    }

    #[test]
    fn test_parse_key_value_rejects_missing_equals() {
        let err = parse_key_value("ticker").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid argument: expected key=value, got \"ticker\""
        );
        assert!(parse_key_value("=AAPL").is_err());
    }

    #[test]
    fn test_job_args_last_value_wins() {
        let raw = vec!["ticker=msft".to_string(), "ticker=AAPL".to_string()];
        let args = parse_job_args(&raw).unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args["ticker"], "AAPL");
    }

    #[test]
    fn test_overrides_keep_order_and_upper_case_keys() {
        let raw = vec![
            "download_delay=2".to_string(),
            "DOWNLOAD_DELAY=0".to_string(),
        ];
        let overrides = parse_overrides(&raw).unwrap();
        assert_eq!(
            overrides,
            vec![
                ("DOWNLOAD_DELAY".to_string(), "2".to_string()),
                ("DOWNLOAD_DELAY".to_string(), "0".to_string()),
            ]
        );
    }
}
