use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use super::{PriceHistory, PriceInterval, PricePeriod, PricePoint};
use crate::config::Settings;

/// Yahoo Finance chart response
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Meta {
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

/// Fetch closing prices for `ticker` over `period` from Yahoo Finance's
/// chart API at `settings.yahoo_chart_url`.
pub async fn fetch_price_history(
    settings: &Settings,
    ticker: &str,
    period: PricePeriod,
    interval: PriceInterval,
) -> Result<PriceHistory> {
    info!(
        "Fetching {} prices for {} ({} candles)",
        period.as_str(),
        ticker,
        interval.as_str()
    );

    let client = Client::builder()
        .user_agent(format!(
            "Mozilla/5.0 (compatible; stockscraper/{})",
            env!("CARGO_PKG_VERSION")
        ))
        .timeout(settings.download_timeout())
        .build()?;

    let url = format!("{}/{}", settings.yahoo_chart_url, ticker);
    let response = client
        .get(&url)
        .query(&[("range", period.as_str()), ("interval", interval.as_str())])
        .send()
        .await
        .context("Failed to send request to Yahoo Finance")?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Yahoo Finance returned error status: {}",
            response.status()
        ));
    }

    let body = response
        .text()
        .await
        .context("Failed to read Yahoo Finance response")?;
    let (currency, points) = parse_chart(&body)?;
    Ok(PriceHistory::new(ticker, period, interval, currency, points))
}

/// Pair timestamps with closes, skipping candles without a close.
fn parse_chart(body: &str) -> Result<(Option<String>, Vec<PricePoint>)> {
    let data: ChartResponse =
        serde_json::from_str(body).context("Failed to parse Yahoo Finance response")?;

    if let Some(error) = data.chart.error {
        return Err(anyhow!(
            "Yahoo Finance API error: {} - {}",
            error.code,
            error.description
        ));
    }

    let result = data
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| anyhow!("No data returned from Yahoo Finance"))?;

    let timestamps = result.timestamp.unwrap_or_default();
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .and_then(|q| q.close)
        .unwrap_or_default();

    let points = timestamps
        .into_iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let close = close.filter(|c| c.is_finite())?;
            let time = DateTime::<Utc>::from_timestamp(ts, 0)?;
            Some(PricePoint { time, close })
        })
        .collect();

    Ok((result.meta.currency, points))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chart_skips_missing_closes() {
        let body = r#"{"chart": {"result": [{
            "meta": {"currency": "USD", "symbol": "AAPL"},
            "timestamp": [1730467800, 1730727000, 1730813400],
            "indicators": {"quote": [{"close": [222.91, null, 223.45]}]}
        }], "error": null}}"#;

        let (currency, points) = parse_chart(body).unwrap();
        assert_eq!(currency.as_deref(), Some("USD"));
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].close, 222.91);
        assert_eq!(points[1].time.timestamp(), 1730813400);
    }

    #[test]
    fn test_parse_chart_reports_api_errors() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let err = parse_chart(body).unwrap_err();
        assert!(err.to_string().contains("symbol may be delisted"));
    }

    #[test]
    fn test_parse_chart_without_timestamps_is_empty() {
        let body = r#"{"chart": {"result": [{"meta": {}, "indicators": {"quote": [{}]}}], "error": null}}"#;
        let (currency, points) = parse_chart(body).unwrap();
        assert_eq!(currency, None);
        assert!(points.is_empty());
    }
}
