//! Job registry
//!
//! A job is a named [`Spider`] plus the settings it layers over the
//! project's. Jobs receive their `-a key=value` arguments as plain strings.

pub mod rss;
pub mod sec_filings;
pub mod yahoo_news_rss;

use anyhow::Result;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::Settings;
use crate::engine::{CrawlStats, Crawler, Spider};
use crate::error::ScrapeError;
use crate::pipelines::PipelineChain;

pub use sec_filings::SecFilings;
pub use yahoo_news_rss::YahooNewsRss;

/// `-a key=value` job arguments.
pub type JobArgs = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy)]
pub struct JobInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub args: &'static [&'static str],
}

pub const JOBS: &[JobInfo] = &[
    JobInfo {
        name: sec_filings::NAME,
        description: "Recent 10-K, 10-Q and 8-K filings from SEC EDGAR",
        args: &["cik", "ticker"],
    },
    JobInfo {
        name: yahoo_news_rss::NAME,
        description: "Yahoo Finance RSS headlines with article text",
        args: &["ticker"],
    },
];

pub fn find_job(name: &str) -> Result<&'static JobInfo> {
    JOBS.iter()
        .find(|job| job.name == name)
        .ok_or_else(|| ScrapeError::UnknownJob(name.to_string()).into())
}

/// Settings a job layers over the project's, below command-line overrides.
pub fn apply_job_settings(name: &str, settings: &mut Settings) {
    if name == sec_filings::NAME {
        // SEC requires a contact address in the user agent.
        settings.download_delay = 0.5;
        settings.user_agent = Some(format!(
            "{}/{} (contact: {})",
            settings.bot_name,
            env!("CARGO_PKG_VERSION"),
            settings.sec_contact
        ));
    }
}

/// Resolve the job's settings, build it from `args` and crawl it.
pub async fn run_job(
    name: &str,
    args: &JobArgs,
    base: &Settings,
    overrides: &[(String, String)],
) -> Result<CrawlStats> {
    let job = find_job(name)?;

    let mut settings = base.clone();
    apply_job_settings(job.name, &mut settings);
    settings.apply_overrides(overrides)?;

    for key in args.keys() {
        if !job.args.contains(&key.as_str()) {
            debug!("Job {} ignores argument {}", job.name, key);
        }
    }

    match job.name {
        sec_filings::NAME => {
            let spider = SecFilings::from_args(args, &settings).await?;
            crawl(spider, settings).await
        }
        yahoo_news_rss::NAME => {
            let spider = YahooNewsRss::from_args(args, &settings)?;
            crawl(spider, settings).await
        }
        other => Err(ScrapeError::UnknownJob(other.to_string()).into()),
    }
}

async fn crawl<S: Spider>(spider: S, settings: Settings) -> Result<CrawlStats> {
    let pipelines = PipelineChain::from_settings(&settings)?;
    Crawler::new(spider, settings, pipelines)?.crawl().await
}
