//! Error handling for stockscraper
//!
//! Defines the crawler's domain errors and establishes a unified Result type
//! using anyhow for context chaining and error propagation.

use thiserror::Error;

/// Core error types for crawl operations
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("no active project: stockscraper.toml not found in {0} or any parent directory")]
    NoActiveProject(String),

    #[error("unknown job: {0} (run `stockscraper list` to see available jobs)")]
    UnknownJob(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("could not find CIK for ticker {0}")]
    CikNotFound(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("database error: {0}")]
    Db(String),

    #[error("item dropped: {0}")]
    DropItem(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    pub fn invalid_setting(key: &str, reason: impl Into<String>) -> Self {
        ScrapeError::InvalidSetting {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for crawl operations
pub type Result<T> = anyhow::Result<T>;
