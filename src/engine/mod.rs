//! Crawl engine
//!
//! Drives a [`Spider`]: schedules its requests through the duplicate filter,
//! downloads them concurrently (robots.txt, per-domain throttle, retries),
//! hands successful responses back to the spider and pushes the resulting
//! items through the pipeline chain. Callbacks and pipelines run on the
//! engine task, one response at a time.

pub mod fetcher;
pub mod request;
pub mod robots;
pub mod stats;
pub mod throttle;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::ScrapeError;
use crate::items::ScrapedItem;
use crate::pipelines::PipelineChain;

pub use request::{Output, Request, Response};
pub use stats::{CrawlStats, FinishReason};

use robots::RobotsCache;
use throttle::{Throttle, ThrottleConfig};

/// A named crawl definition.
///
/// `Callback` identifies which parse step a response belongs to and carries
/// any data that step needs from the request that produced it.
pub trait Spider: Send + 'static {
    type Callback: Send + Sync + 'static;

    fn name(&self) -> &'static str;

    fn start_requests(&self) -> Result<Vec<Request<Self::Callback>>>;

    fn parse(
        &self,
        response: &Response,
        callback: Self::Callback,
    ) -> Result<Vec<Output<Self::Callback>>>;
}

enum DownloadOutcome {
    Response(Response),
    Forbidden,
    Failed(anyhow::Error),
}

struct Download<C> {
    request: Request<C>,
    outcome: DownloadOutcome,
    /// HTTP requests actually sent, retries included.
    attempts: u64,
    statuses: Vec<u16>,
}

/// Shared by all download tasks of one crawl.
struct Downloader {
    client: Client,
    throttle: Throttle,
    robots: Option<RobotsCache>,
    retry_times: u32,
}

impl Downloader {
    async fn download<C>(&self, request: Request<C>) -> Download<C> {
        if let Some(robots) = &self.robots {
            if !robots.is_allowed(&request.url).await {
                return Download {
                    request,
                    outcome: DownloadOutcome::Forbidden,
                    attempts: 0,
                    statuses: Vec::new(),
                };
            }
        }

        let mut attempts = 0u64;
        let mut statuses = Vec::new();
        let mut retries = 0u32;

        loop {
            let permit = self.throttle.acquire(&request.url).await;
            let started = Instant::now();
            attempts += 1;
            let result = fetcher::fetch(&self.client, &request).await;
            let latency = started.elapsed();

            match result {
                Ok(response) => {
                    let success = is_success(response.status);
                    self.throttle.record(&permit.domain, latency, success).await;
                    drop(permit);
                    statuses.push(response.status);

                    if fetcher::is_retryable_status(response.status) {
                        if retries < self.retry_times {
                            retries += 1;
                            debug!(
                                "Retrying <GET {}> (failed {} times): {}",
                                request.url, retries, response.status
                            );
                            continue;
                        }
                        if self.retry_times > 0 {
                            error!(
                                "Gave up retrying <GET {}> (failed {} times): {}",
                                request.url,
                                retries + 1,
                                response.status
                            );
                        }
                    }

                    return Download {
                        request,
                        outcome: DownloadOutcome::Response(response),
                        attempts,
                        statuses,
                    };
                }
                Err(err) => {
                    self.throttle.record(&permit.domain, latency, false).await;
                    drop(permit);

                    if retries < self.retry_times {
                        retries += 1;
                        debug!(
                            "Retrying <GET {}> (failed {} times): {:#}",
                            request.url, retries, err
                        );
                        continue;
                    }

                    return Download {
                        request,
                        outcome: DownloadOutcome::Failed(err),
                        attempts,
                        statuses,
                    };
                }
            }
        }
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Runs one spider to completion.
pub struct Crawler<S: Spider> {
    spider: S,
    settings: Settings,
    pipelines: PipelineChain,
    downloader: Arc<Downloader>,
}

impl<S: Spider> Crawler<S> {
    pub fn new(spider: S, settings: Settings, pipelines: PipelineChain) -> Result<Self> {
        let client = fetcher::build_client(&settings)?;
        let robots = settings
            .robotstxt_obey
            .then(|| RobotsCache::new(client.clone(), &settings.user_agent()));
        let retry_times = if settings.retry_enabled {
            settings.retry_times
        } else {
            0
        };

        let downloader = Arc::new(Downloader {
            client,
            throttle: Throttle::new(ThrottleConfig::from_settings(&settings)),
            robots,
            retry_times,
        });

        Ok(Self {
            spider,
            settings,
            pipelines,
            downloader,
        })
    }

    pub async fn crawl(mut self) -> Result<CrawlStats> {
        let name = self.spider.name();
        let mut stats = CrawlStats::new(name);

        let start_requests = self.spider.start_requests()?;

        info!("Spider opened: {}", name);
        info!(
            "Pipelines enabled: [{}]",
            self.pipelines.names().join(", ")
        );
        self.pipelines
            .open()
            .await
            .with_context(|| format!("Failed to open pipelines for {}", name))?;

        let mut queue: VecDeque<Request<S::Callback>> = VecDeque::new();
        let mut seen: HashSet<String> = HashSet::new();
        for request in start_requests {
            schedule(request, &mut queue, &mut seen, &mut stats);
        }

        let max_in_flight = self.settings.concurrent_requests.max(1);
        let item_limit = self.settings.closespider_itemcount as u64;
        let mut in_flight: JoinSet<Download<S::Callback>> = JoinSet::new();
        let mut reason = FinishReason::Finished;

        'crawl: loop {
            while in_flight.len() < max_in_flight {
                let Some(request) = queue.pop_front() else {
                    break;
                };
                let downloader = self.downloader.clone();
                in_flight.spawn(async move { downloader.download(request).await });
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let Download {
                request,
                outcome,
                attempts,
                statuses,
            } = match joined {
                Ok(download) => download,
                Err(err) => {
                    error!("Download task failed: {}", err);
                    stats.download_error_count += 1;
                    continue;
                }
            };

            stats.request_count += attempts;
            stats.retry_count += attempts.saturating_sub(1);
            for status in statuses {
                stats.record_status(status);
            }

            let response = match outcome {
                DownloadOutcome::Response(response) => response,
                DownloadOutcome::Forbidden => {
                    stats.robots_forbidden += 1;
                    debug!("Forbidden by robots.txt: <GET {}>", request.url);
                    continue;
                }
                DownloadOutcome::Failed(err) => {
                    stats.download_error_count += 1;
                    error!("Error downloading <GET {}>: {:#}", request.url, err);
                    continue;
                }
            };

            debug!("Crawled ({}) <GET {}>", response.status, response.url);
            if !is_success(response.status) {
                stats.http_error_count += 1;
                info!(
                    "Ignoring response <{} {}>: HTTP status code is not handled or not allowed",
                    response.status, response.url
                );
                continue;
            }

            let outputs = match self.spider.parse(&response, request.callback) {
                Ok(outputs) => outputs,
                Err(err) => {
                    stats.spider_error_count += 1;
                    error!("Spider error processing <GET {}>: {:#}", response.url, err);
                    continue;
                }
            };

            for output in outputs {
                match output {
                    Output::Request(next) => schedule(next, &mut queue, &mut seen, &mut stats),
                    Output::Item(item) => {
                        self.process_item(item, &response, &mut stats).await;
                        if item_limit > 0 && stats.item_scraped_count >= item_limit {
                            info!("Closing spider (closespider_itemcount)");
                            reason = FinishReason::ClosespiderItemcount;
                            break 'crawl;
                        }
                    }
                }
            }
        }

        in_flight.abort_all();
        while in_flight.join_next().await.is_some() {}

        let closed = self.pipelines.close().await;
        stats.finish(reason);
        stats.log_summary();
        closed.with_context(|| format!("Failed to close pipelines for {}", name))?;

        Ok(stats)
    }

    async fn process_item(&mut self, item: ScrapedItem, response: &Response, stats: &mut CrawlStats) {
        if let Err(reason) = item.validate() {
            stats.item_dropped_count += 1;
            warn!("Dropped: {} ({})", reason, item.describe());
            return;
        }

        match self.pipelines.process(item).await {
            Ok(item) => {
                stats.item_scraped_count += 1;
                debug!("Scraped from <{} {}>: {}", response.status, response.url, item.describe());
            }
            Err(err) => {
                stats.item_dropped_count += 1;
                match err.downcast_ref::<ScrapeError>() {
                    Some(ScrapeError::DropItem(reason)) => warn!("Dropped: {}", reason),
                    _ => error!("Error processing item from <GET {}>: {:#}", response.url, err),
                }
            }
        }
    }
}

fn schedule<C>(
    request: Request<C>,
    queue: &mut VecDeque<Request<C>>,
    seen: &mut HashSet<String>,
    stats: &mut CrawlStats,
) {
    if !request.dont_filter && !seen.insert(request.fingerprint()) {
        stats.dupefilter_filtered += 1;
        debug!("Filtered duplicate request: <GET {}>", request.url);
        return;
    }
    queue.push_back(request);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_requests_are_filtered_unless_forced() {
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        let mut stats = CrawlStats::new("test");

        for url in ["https://a.test/x", "https://a.test/x#frag", "https://a.test/y"] {
            schedule(Request::get(url, ()).unwrap(), &mut queue, &mut seen, &mut stats);
        }
        schedule(
            Request::get("https://a.test/x", ()).unwrap().dont_filter(),
            &mut queue,
            &mut seen,
            &mut stats,
        );

        assert_eq!(queue.len(), 3);
        assert_eq!(stats.dupefilter_filtered, 1);
    }

    #[test]
    fn only_2xx_is_success() {
        assert!(is_success(200));
        assert!(is_success(204));
        assert!(!is_success(301));
        assert!(!is_success(404));
        assert!(!is_success(503));
    }
}
