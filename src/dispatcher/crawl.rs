use anyhow::{bail, Result};
use tracing::error;

use crate::config::Project;
use crate::engine::CrawlStats;
use crate::spiders::{self, sec_filings, yahoo_news_rss, JobArgs};
use crate::ui;

/// `crawl <job>`: statistics are logged by the engine when the job closes.
pub async fn dispatch_crawl(
    project: &Project,
    job: &str,
    args: &JobArgs,
    overrides: &[(String, String)],
) -> Result<()> {
    let settings = project.settings()?;
    spiders::run_job(job, args, &settings, overrides).await?;
    Ok(())
}

/// Arguments and overrides for the two runbook jobs.
pub fn runbook_jobs(
    ticker: &str,
    cik: Option<&str>,
    limit: Option<usize>,
) -> (Vec<(&'static str, JobArgs)>, Vec<(String, String)>) {
    let ticker = ticker.trim().to_ascii_uppercase();

    let mut sec_args = JobArgs::new();
    sec_args.insert("ticker".to_string(), ticker.clone());
    if let Some(cik) = cik {
        sec_args.insert("cik".to_string(), cik.trim().to_string());
    }

    let mut news_args = JobArgs::new();
    news_args.insert("ticker".to_string(), ticker);

    let overrides = limit
        .map(|n| vec![("CLOSESPIDER_ITEMCOUNT".to_string(), n.to_string())])
        .unwrap_or_default();

    (
        vec![
            (sec_filings::NAME, sec_args),
            (yahoo_news_rss::NAME, news_args),
        ],
        overrides,
    )
}

fn describe(stats: &CrawlStats) -> String {
    format!(
        "{}: {} items scraped, {} dropped, {} responses ({})",
        stats.job,
        stats.item_scraped_count,
        stats.item_dropped_count,
        stats.response_count,
        stats.finish_reason
    )
}

/// `run --ticker T`: SEC filings then news. Fails only when both jobs fail.
pub async fn dispatch_run(
    project: &Project,
    ticker: &str,
    cik: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let settings = project.settings()?;
    let (jobs, overrides) = runbook_jobs(ticker, cik, limit);
    let ticker = ticker.trim().to_ascii_uppercase();

    println!("{}", ui::section(&format!("Scraping {}", ticker)));

    let mut failed = Vec::new();
    for (job, args) in &jobs {
        match spiders::run_job(job, args, &settings, &overrides).await {
            Ok(stats) => println!("{}", ui::success(&describe(&stats))),
            Err(err) => {
                error!("Job {} failed: {:#}", job, err);
                println!("{}", ui::failure(&format!("{} failed: {:#}", job, err)));
                failed.push(*job);
            }
        }
    }

    if failed.len() == jobs.len() {
        bail!("all jobs failed for {}", ticker);
    }
    println!(
        "{}",
        ui::info(&format!("View results with: stockscraper show {}", ticker))
    );
    Ok(())
}
