//! AI summary and sentiment via an OpenAI-compatible chat completions API.
//!
//! Without `OPENAI_API_KEY` items pass through untouched. A failed call
//! never drops the item; it is stored with [`Sentiment::failed`].

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::ItemPipeline;
use crate::config::Settings;
use crate::error::ScrapeError;
use crate::items::{ScrapedItem, Sentiment, SentimentLabel};
use crate::llm::{ChatClient, ChatMessage};

/// Characters of item text sent to the model.
const MAX_INPUT_CHARS: usize = 1000;
/// Shorter texts are not worth analysing.
const MIN_TEXT_CHARS: usize = 10;

const SYSTEM_PROMPT: &str = "You are a financial analyst. Analyze the following text.";

pub struct SentimentPipeline {
    chat: ChatClient,
}

impl SentimentPipeline {
    pub fn new(api_key: Option<String>, model: &str, base_url: &str) -> Result<Self> {
        Ok(Self {
            chat: ChatClient::new(api_key, model, base_url)?,
        })
    }

    /// Reads the key from `OPENAI_API_KEY`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            chat: ChatClient::from_settings(settings)?,
        })
    }

    async fn analyze(&self, text: &str) -> Result<Sentiment> {
        let excerpt: String = text.chars().take(MAX_INPUT_CHARS).collect();
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_prompt(&excerpt)),
        ];
        let content = self.chat.complete(&messages, 0.2, true).await?;
        parse_analysis(&content)
    }
}

fn user_prompt(excerpt: &str) -> String {
    format!(
        "Respond with a JSON object with the keys \"summary\", \"sentiment\" and \"sentiment_score\":\n\
         1. summary: one concise sentence summarising the text.\n\
         2. sentiment: Positive, Negative or Neutral.\n\
         3. sentiment_score: a number from -1.0 (very negative) to 1.0 (very positive).\n\n\
         Text: \"{}\"",
        excerpt
    )
}

/// Parse the model's JSON answer. The score may arrive as a number or a
/// numeric string; a missing label is `Unknown`.
pub fn parse_analysis(content: &str) -> Result<Sentiment> {
    let value: serde_json::Value = serde_json::from_str(content.trim())
        .map_err(|e| ScrapeError::Parse(format!("analysis is not JSON: {}", e)))?;

    let summary = value
        .get("summary")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let label = value
        .get("sentiment")
        .and_then(|v| v.as_str())
        .map(SentimentLabel::from_label)
        .unwrap_or_default();
    let score = match value.get("sentiment_score") {
        None | Some(serde_json::Value::Null) => 0.0,
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ScrapeError::Parse(format!("sentiment_score {:?} is not a number", s)))?,
        Some(other) => {
            return Err(ScrapeError::Parse(format!("sentiment_score {} is not a number", other)).into())
        }
    };

    Ok(Sentiment::new(summary, label, score))
}

#[async_trait]
impl ItemPipeline for SentimentPipeline {
    fn name(&self) -> &'static str {
        "sentiment"
    }

    async fn open(&mut self) -> Result<()> {
        if !self.chat.is_configured() {
            warn!("OPENAI_API_KEY environment variable not set. Sentiment analysis will be skipped.");
        }
        Ok(())
    }

    async fn process_item(&mut self, mut item: ScrapedItem) -> Result<ScrapedItem> {
        if !self.chat.is_configured() {
            return Ok(item);
        }

        let text = item.analysis_text();
        if text.trim().chars().count() < MIN_TEXT_CHARS {
            debug!("No meaningful text for {}, skipping analysis", item.describe());
            return Ok(item);
        }

        let sentiment = match self.analyze(&text).await {
            Ok(sentiment) => {
                debug!(
                    "Analysis for {}: {} ({:.2})",
                    item.describe(),
                    sentiment.sentiment,
                    sentiment.sentiment_score
                );
                sentiment
            }
            Err(err) => {
                error!("OpenAI API call failed: {:#}", err);
                Sentiment::failed()
            }
        };
        item.set_sentiment(sentiment);
        Ok(item)
    }
}
