use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;

use super::request::{Request, Response};
use crate::config::Settings;

/// Statuses worth another attempt.
pub const RETRY_HTTP_CODES: &[u16] = &[408, 429, 500, 502, 503, 504, 522, 524];

const DEFAULT_ACCEPT: &str =
    "application/json,text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Build the shared HTTP client from crawl settings.
pub fn build_client(settings: &Settings) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en"));

    Client::builder()
        .user_agent(settings.user_agent())
        .default_headers(headers)
        .timeout(settings.download_timeout())
        .build()
        .context("Failed to build HTTP client")
}

pub fn is_retryable_status(status: u16) -> bool {
    RETRY_HTTP_CODES.contains(&status)
}

/// Download one request. Transport failures are errors; any HTTP status is
/// returned as a response.
pub async fn fetch<C>(client: &Client, request: &Request<C>) -> Result<Response> {
    let mut builder = client.get(request.url.clone());
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name {}", name))?;
        let value =
            HeaderValue::from_str(value).with_context(|| format!("Invalid header value {}", value))?;
        builder = builder.header(name, value);
    }

    let resp = builder
        .send()
        .await
        .with_context(|| format!("Request to {} failed", request.url))?;

    let url = resp.url().clone();
    let status = resp.status().as_u16();
    let headers = resp.headers().clone();
    let body = resp
        .bytes()
        .await
        .with_context(|| format!("Failed to read body from {}", url))?
        .to_vec();

    Ok(Response {
        url,
        status,
        headers,
        body,
    })
}
