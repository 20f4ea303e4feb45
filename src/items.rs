//! Scraped item types
//!
//! Jobs emit [`ScrapedItem`]s; pipelines enrich, store or drop them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall tone assigned by the sentiment pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    #[default]
    Unknown,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Negative => "Negative",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Unknown => "Unknown",
        }
    }

    /// Lenient parse; anything unrecognised is `Unknown`.
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => SentimentLabel::Positive,
            "negative" => SentimentLabel::Negative,
            "neutral" => SentimentLabel::Neutral,
            _ => SentimentLabel::Unknown,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AI-generated summary and sentiment attached to an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sentiment {
    pub summary_ai: String,
    pub sentiment: SentimentLabel,
    pub sentiment_score: f64,
}

impl Sentiment {
    pub fn new(summary_ai: impl Into<String>, sentiment: SentimentLabel, score: f64) -> Self {
        let score = if score.is_finite() {
            score.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        Self {
            summary_ai: summary_ai.into(),
            sentiment,
            sentiment_score: score,
        }
    }

    /// Marker stored when the analysis call failed.
    pub fn failed() -> Self {
        Self::new("Error in analysis.", SentimentLabel::Unknown, 0.0)
    }
}

/// One 10-K, 10-Q or 8-K filing with its report text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SecFilingItem {
    pub cik: String,
    pub ticker: String,
    pub company_name: String,
    pub form: String,
    pub filing_date: String,
    pub accession_no: String,
    pub primary_doc: String,
    pub report_url: String,
    pub report_text: String,
    pub sentiment: Option<Sentiment>,
}

/// One Yahoo Finance headline with the article body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewsItem {
    pub ticker: String,
    pub source: String,
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub summary: String,
    pub article_text: String,
    pub sentiment: Option<Sentiment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    Filing,
    News,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Filing => "sec_filings",
            ItemKind::News => "news",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScrapedItem {
    Filing(SecFilingItem),
    News(NewsItem),
}

impl ScrapedItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            ScrapedItem::Filing(_) => ItemKind::Filing,
            ScrapedItem::News(_) => ItemKind::News,
        }
    }

    pub fn ticker(&self) -> &str {
        match self {
            ScrapedItem::Filing(f) => &f.ticker,
            ScrapedItem::News(n) => &n.ticker,
        }
    }

    pub fn sentiment(&self) -> Option<&Sentiment> {
        match self {
            ScrapedItem::Filing(f) => f.sentiment.as_ref(),
            ScrapedItem::News(n) => n.sentiment.as_ref(),
        }
    }

    pub fn set_sentiment(&mut self, sentiment: Sentiment) {
        match self {
            ScrapedItem::Filing(f) => f.sentiment = Some(sentiment),
            ScrapedItem::News(n) => n.sentiment = Some(sentiment),
        }
    }

    /// Text handed to the sentiment model: report text, else article text,
    /// else the headline and feed summary.
    pub fn analysis_text(&self) -> String {
        match self {
            ScrapedItem::Filing(f) if !f.report_text.is_empty() => f.report_text.clone(),
            ScrapedItem::Filing(f) => f.form.clone(),
            ScrapedItem::News(n) if !n.article_text.is_empty() => n.article_text.clone(),
            ScrapedItem::News(n) => format!("{} - {}", n.title, n.summary),
        }
    }

    /// Required fields check applied before pipelines see the item.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ScrapedItem::Filing(f) => {
                if f.form.trim().is_empty() {
                    return Err("filing has no form type".to_string());
                }
                if f.report_url.trim().is_empty() {
                    return Err("filing has no report URL".to_string());
                }
            }
            ScrapedItem::News(n) => {
                if n.link.trim().is_empty() {
                    return Err("news item has no link".to_string());
                }
            }
        }
        Ok(())
    }

    /// Short one-line description for logs.
    pub fn describe(&self) -> String {
        match self {
            ScrapedItem::Filing(f) => format!("{} - {} - {}", f.ticker, f.form, f.filing_date),
            ScrapedItem::News(n) => format!("{} - {}", n.ticker, n.title),
        }
    }
}
