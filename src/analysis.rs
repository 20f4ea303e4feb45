//! Derived views over stored rows: the news sentiment trend and the
//! AI-generated insights shown by `show`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::db::{FilingRecord, NewsRecord};
use crate::llm::{ChatClient, ChatMessage};
use crate::pricing::PriceHistory;

/// Items averaged by the sentiment trend.
pub const TREND_WINDOW: usize = 5;

const INSIGHT_HEADLINES: usize = 10;
const INSIGHT_FORMS: usize = 5;
const INSIGHTS_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SentimentPoint {
    pub when: DateTime<Utc>,
    pub score: f64,
    /// Mean of this score and up to `TREND_WINDOW - 1` earlier ones.
    pub rolling_mean: f64,
}

/// News sentiment in publication order with a trailing rolling mean.
/// Undated news has no place on the timeline and is left out.
pub fn sentiment_trend(news: &[NewsRecord], window: usize) -> Vec<SentimentPoint> {
    let window = window.max(1);
    let mut dated: Vec<(DateTime<Utc>, f64)> = news
        .iter()
        .filter(|n| n.sentiment_score.is_finite())
        .filter_map(|n| n.published.map(|when| (when, n.sentiment_score)))
        .collect();
    dated.sort_by_key(|(when, _)| *when);

    let mut recent: VecDeque<f64> = VecDeque::with_capacity(window);
    dated
        .into_iter()
        .map(|(when, score)| {
            if recent.len() == window {
                recent.pop_front();
            }
            recent.push_back(score);
            SentimentPoint {
                when,
                score,
                rolling_mean: recent.iter().sum::<f64>() / recent.len() as f64,
            }
        })
        .collect()
}

/// Prompt for the insights section. `news` and `filings` are newest first.
pub fn insights_prompt(
    ticker: &str,
    filings: &[FilingRecord],
    news: &[NewsRecord],
    price: Option<&PriceHistory>,
) -> String {
    let headlines: Vec<String> = news
        .iter()
        .map(|n| n.title.trim())
        .filter(|t| !t.is_empty())
        .take(INSIGHT_HEADLINES)
        .map(|t| format!("- {}", t))
        .collect();
    let headlines = if headlines.is_empty() {
        "No recent news available".to_string()
    } else {
        headlines.join("\n")
    };

    let mut forms: Vec<&str> = Vec::new();
    for form in filings
        .iter()
        .take(INSIGHT_FORMS)
        .map(|f| f.form.as_str())
        .filter(|f| !f.is_empty())
    {
        if !forms.contains(&form) {
            forms.push(form);
        }
    }
    let forms = if forms.is_empty() {
        "None".to_string()
    } else {
        forms.join(", ")
    };

    let price_change = price
        .and_then(|p| p.last_change_pct)
        .map(|pct| format!("{:.2}%", pct))
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "You are a senior financial analyst for a hedge fund.\n\
         Given the latest data for the stock {ticker}, provide a bulleted list of 3-5 key actionable insights.\n\
         Be concise and direct. Focus on what a trader or investor should be aware of.\n\n\
         Latest News Headlines:\n{headlines}\n\n\
         Recent SEC Filings: {forms}\n\
         Last Price Change: {price_change}\n\n\
         Generate the insights now."
    )
}

pub async fn generate_insights(chat: &ChatClient, prompt: &str) -> Result<String> {
    let reply = chat
        .complete(&[ChatMessage::user(prompt)], INSIGHTS_TEMPERATURE, false)
        .await?;
    Ok(reply.trim().to_string())
}
