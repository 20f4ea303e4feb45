use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Finished,
    ClosespiderItemcount,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Finished => f.write_str("finished"),
            FinishReason::ClosespiderItemcount => f.write_str("closespider_itemcount"),
        }
    }
}

/// Counters collected over one crawl.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlStats {
    pub job: String,
    pub start_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
    pub finish_reason: FinishReason,
    pub request_count: u64,
    pub response_count: u64,
    pub status_counts: BTreeMap<u16, u64>,
    pub item_scraped_count: u64,
    pub item_dropped_count: u64,
    pub retry_count: u64,
    pub dupefilter_filtered: u64,
    pub robots_forbidden: u64,
    pub http_error_count: u64,
    pub download_error_count: u64,
    pub spider_error_count: u64,
}

impl CrawlStats {
    pub fn new(job: &str) -> Self {
        Self {
            job: job.to_string(),
            start_time: Utc::now(),
            finish_time: None,
            finish_reason: FinishReason::Finished,
            request_count: 0,
            response_count: 0,
            status_counts: BTreeMap::new(),
            item_scraped_count: 0,
            item_dropped_count: 0,
            retry_count: 0,
            dupefilter_filtered: 0,
            robots_forbidden: 0,
            http_error_count: 0,
            download_error_count: 0,
            spider_error_count: 0,
        }
    }

    pub fn record_status(&mut self, status: u16) {
        self.response_count += 1;
        *self.status_counts.entry(status).or_insert(0) += 1;
    }

    pub fn finish(&mut self, reason: FinishReason) {
        self.finish_reason = reason;
        self.finish_time = Some(Utc::now());
    }

    pub fn elapsed_seconds(&self) -> f64 {
        let end = self.finish_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    /// Log the closing stats dump.
    pub fn log_summary(&self) {
        info!("Dumping crawl stats for {}:", self.job);
        info!("  requests: {}", self.request_count);
        info!("  responses: {}", self.response_count);
        for (status, count) in &self.status_counts {
            info!("  response_status_count/{}: {}", status, count);
        }
        info!("  items scraped: {}", self.item_scraped_count);
        info!("  items dropped: {}", self.item_dropped_count);
        info!("  retries: {}", self.retry_count);
        info!("  duplicates filtered: {}", self.dupefilter_filtered);
        info!("  forbidden by robots.txt: {}", self.robots_forbidden);
        info!("  http errors ignored: {}", self.http_error_count);
        info!("  download errors: {}", self.download_error_count);
        info!("  spider errors: {}", self.spider_error_count);
        info!("  elapsed: {:.2}s", self.elapsed_seconds());
        info!("Job {} closed ({})", self.job, self.finish_reason);
    }
}
