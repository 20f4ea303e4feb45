//! Closing-price history for the `show` report.

pub mod yahoo;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;

/// How far back the price history goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum PricePeriod {
    #[value(name = "1mo")]
    #[serde(rename = "1mo")]
    OneMonth,
    #[value(name = "3mo")]
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[value(name = "6mo")]
    #[serde(rename = "6mo")]
    SixMonths,
    #[value(name = "1y")]
    #[serde(rename = "1y")]
    OneYear,
    #[value(name = "2y")]
    #[serde(rename = "2y")]
    TwoYears,
}

impl PricePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricePeriod::OneMonth => "1mo",
            PricePeriod::ThreeMonths => "3mo",
            PricePeriod::SixMonths => "6mo",
            PricePeriod::OneYear => "1y",
            PricePeriod::TwoYears => "2y",
        }
    }
}

/// Spacing between price points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum PriceInterval {
    #[value(name = "1d")]
    #[serde(rename = "1d")]
    Daily,
    #[value(name = "1h")]
    #[serde(rename = "1h")]
    Hourly,
}

impl PriceInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceInterval::Daily => "1d",
            PriceInterval::Hourly => "1h",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub close: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceHistory {
    pub ticker: String,
    pub period: PricePeriod,
    pub interval: PriceInterval,
    pub currency: Option<String>,
    pub points: Vec<PricePoint>,
    /// Last close against the one before it, in percent.
    pub last_change_pct: Option<f64>,
    /// Last close against the first close of the period, in percent.
    pub period_change_pct: Option<f64>,
}

impl PriceHistory {
    pub fn new(
        ticker: &str,
        period: PricePeriod,
        interval: PriceInterval,
        currency: Option<String>,
        points: Vec<PricePoint>,
    ) -> Self {
        let closes: Vec<f64> = points.iter().map(|p| p.close).collect();
        let last_change_pct = match closes.as_slice() {
            [.., prev, last] => pct_change(*prev, *last),
            _ => None,
        };
        let period_change_pct = match closes.as_slice() {
            [first, .., last] => pct_change(*first, *last),
            _ => None,
        };
        Self {
            ticker: ticker.to_string(),
            period,
            interval,
            currency,
            points,
            last_change_pct,
            period_change_pct,
        }
    }

    pub fn last_close(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }

    pub fn low(&self) -> Option<f64> {
        self.points.iter().map(|p| p.close).reduce(f64::min)
    }

    pub fn high(&self) -> Option<f64> {
        self.points.iter().map(|p| p.close).reduce(f64::max)
    }
}

fn pct_change(from: f64, to: f64) -> Option<f64> {
    (from != 0.0).then(|| (to - from) / from * 100.0)
}

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One-line chart of `values`, squeezed to at most `width` columns by
/// averaging neighbouring points.
pub fn sparkline(values: &[f64], width: usize) -> String {
    if values.is_empty() || width == 0 {
        return String::new();
    }
    let buckets = width.min(values.len());
    let columns: Vec<f64> = (0..buckets)
        .map(|i| {
            let start = i * values.len() / buckets;
            let end = ((i + 1) * values.len() / buckets).max(start + 1);
            let slice = &values[start..end];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect();

    let min = columns.iter().copied().fold(f64::INFINITY, f64::min);
    let max = columns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    columns
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                SPARK[SPARK.len() / 2]
            } else {
                let level = ((v - min) / span * (SPARK.len() - 1) as f64).round() as usize;
                SPARK[level.min(SPARK.len() - 1)]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn history(closes: &[f64]) -> PriceHistory {
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, close)| PricePoint {
                time: Utc.with_ymd_and_hms(2024, 11, 1 + i as u32, 21, 0, 0).unwrap(),
                close: *close,
            })
            .collect();
        PriceHistory::new("AAPL", PricePeriod::SixMonths, PriceInterval::Daily, None, points)
    }

    #[test]
    fn changes_use_last_and_first_closes() {
        let h = history(&[200.0, 210.0, 231.0]);
        assert!((h.last_change_pct.unwrap() - 10.0).abs() < 1e-9);
        assert!((h.period_change_pct.unwrap() - 15.5).abs() < 1e-9);
        assert_eq!(h.low(), Some(200.0));
        assert_eq!(h.high(), Some(231.0));
        assert_eq!(h.last_close(), Some(231.0));
    }

    #[test]
    fn single_point_has_no_change() {
        let h = history(&[200.0]);
        assert_eq!(h.last_change_pct, None);
        assert_eq!(h.period_change_pct, None);
        assert_eq!(history(&[]).last_close(), None);
        assert_eq!(history(&[0.0, 5.0]).last_change_pct, None);
    }

    #[test]
    fn sparkline_spans_low_to_high() {
        assert_eq!(sparkline(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 8), "▁▂▃▄▅▆▇█");
        assert_eq!(sparkline(&[5.0, 5.0], 10), "▅▅");
        assert_eq!(sparkline(&[1.0, 1.0, 9.0, 9.0], 2), "▁█");
        assert_eq!(sparkline(&[], 10), "");
    }

    #[test]
    fn names_match_the_chart_api() {
        assert_eq!(PricePeriod::SixMonths.as_str(), "6mo");
        assert_eq!(PriceInterval::Hourly.as_str(), "1h");
        assert_eq!(
            serde_json::to_value(PricePeriod::TwoYears).unwrap(),
            serde_json::json!("2y")
        );
    }
}
