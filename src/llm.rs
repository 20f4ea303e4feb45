//! OpenAI-compatible chat completions client.
//!
//! Shared by the sentiment pipeline and the `show --insights` report.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Settings;
use crate::error::ScrapeError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

impl ChatClient {
    pub fn new(api_key: Option<String>, model: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build OpenAI client")?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.to_string(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    /// Reads the key from `OPENAI_API_KEY`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            std::env::var("OPENAI_API_KEY").ok(),
            &settings.openai_model,
            &settings.openai_base_url,
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send one chat completion and return the first choice's text.
    /// `json_object` asks the model for a JSON object reply.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        json_object: bool,
    ) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ScrapeError::InvalidArgument("OPENAI_API_KEY is not set".to_string()))?;

        let request = ChatRequest {
            model: &self.model,
            messages,
            response_format: json_object.then_some(ResponseFormat {
                kind: "json_object",
            }),
            temperature,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.endpoint))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScrapeError::Http(format!("OpenAI API error ({}): {}", status, body)).into());
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .context("Failed to parse OpenAI response")?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ScrapeError::Parse("OpenAI response had no content".to_string()).into())
    }
}
