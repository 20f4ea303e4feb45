use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::items::{NewsItem, SecFilingItem, Sentiment, SentimentLabel};

/// A `sec_filings` row as written to the warehouse.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FilingRecord {
    pub cik: String,
    pub ticker: String,
    pub company_name: String,
    pub form: String,
    pub filing_date: Option<NaiveDate>,
    pub accession_no: String,
    pub primary_doc: String,
    pub report_url: String,
    pub report_text: String,
    pub summary_ai: String,
    pub sentiment: String,
    pub sentiment_score: f64,
    pub scraped_at: DateTime<Utc>,
}

/// A `news` row as written to the warehouse.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsRecord {
    pub ticker: String,
    pub source: String,
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub summary: String,
    pub article_text: String,
    pub summary_ai: String,
    pub sentiment: String,
    pub sentiment_score: f64,
    pub scraped_at: DateTime<Utc>,
}

/// Missing sentiment columns default to an empty summary, `Unknown` and 0.0.
fn sentiment_columns(sentiment: Option<&Sentiment>) -> (String, String, f64) {
    match sentiment {
        Some(s) => (
            s.summary_ai.clone(),
            s.sentiment.as_str().to_string(),
            s.sentiment_score,
        ),
        None => (
            String::new(),
            SentimentLabel::Unknown.as_str().to_string(),
            0.0,
        ),
    }
}

/// Filing dates arrive as `YYYY-MM-DD`; anything else is stored as NULL.
pub fn parse_filing_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

impl FilingRecord {
    pub fn from_item(item: &SecFilingItem, scraped_at: DateTime<Utc>) -> Self {
        let (summary_ai, sentiment, sentiment_score) = sentiment_columns(item.sentiment.as_ref());
        Self {
            cik: item.cik.clone(),
            ticker: item.ticker.clone(),
            company_name: item.company_name.clone(),
            form: item.form.clone(),
            filing_date: parse_filing_date(&item.filing_date),
            accession_no: item.accession_no.clone(),
            primary_doc: item.primary_doc.clone(),
            report_url: item.report_url.clone(),
            report_text: item.report_text.clone(),
            summary_ai,
            sentiment,
            sentiment_score,
            scraped_at,
        }
    }
}

impl NewsRecord {
    pub fn from_item(item: &NewsItem, scraped_at: DateTime<Utc>) -> Self {
        let (summary_ai, sentiment, sentiment_score) = sentiment_columns(item.sentiment.as_ref());
        Self {
            ticker: item.ticker.clone(),
            source: item.source.clone(),
            title: item.title.clone(),
            link: item.link.clone(),
            published: item.published,
            summary: item.summary.clone(),
            article_text: item.article_text.clone(),
            summary_ai,
            sentiment,
            sentiment_score,
            scraped_at,
        }
    }
}
