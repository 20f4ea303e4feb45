//! Per-domain request spacing.
//!
//! Every domain gets a delay between consecutive request starts and a cap on
//! concurrent downloads. With autothrottle the delay follows observed
//! latency: with `target = latency / target_concurrency` the next delay is
//! `max(target, (current + target) / 2)`, so it jumps up to a slow target
//! at once and decays halfway towards a fast one. It stays within
//! `DOWNLOAD_DELAY..=AUTOTHROTTLE_MAX_DELAY`, and error responses cannot
//! shorten it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Url;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::config::Settings;

#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub download_delay: Duration,
    pub autothrottle: bool,
    pub max_delay: Duration,
    pub target_concurrency: f64,
    pub per_domain: usize,
}

impl ThrottleConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            download_delay: settings.download_delay(),
            autothrottle: settings.autothrottle_enabled,
            max_delay: Duration::from_secs_f64(settings.autothrottle_max_delay),
            target_concurrency: settings.autothrottle_target_concurrency,
            per_domain: settings.concurrent_requests_per_domain.max(1),
        }
    }
}

#[derive(Debug)]
struct DomainSlot {
    delay: Duration,
    next_start: Option<Instant>,
    permits: Arc<Semaphore>,
}

/// Held for the duration of one download.
#[derive(Debug)]
pub struct DomainPermit {
    pub domain: String,
    _permit: Option<OwnedSemaphorePermit>,
}

#[derive(Debug)]
pub struct Throttle {
    config: ThrottleConfig,
    domains: Mutex<HashMap<String, DomainSlot>>,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            domains: Mutex::new(HashMap::new()),
        }
    }

    pub fn domain_of(url: &Url) -> String {
        url.host_str().unwrap_or("").to_ascii_lowercase()
    }

    /// Wait for a free download slot on the URL's domain and for the
    /// domain's delay to elapse.
    pub async fn acquire(&self, url: &Url) -> DomainPermit {
        let domain = Self::domain_of(url);

        let permits = {
            let mut domains = self.domains.lock().await;
            domains
                .entry(domain.clone())
                .or_insert_with(|| self.new_slot())
                .permits
                .clone()
        };
        // Semaphores are never closed, so this only fails if that changes.
        let permit = permits.acquire_owned().await.ok();

        let wait = {
            let mut domains = self.domains.lock().await;
            let slot = domains
                .entry(domain.clone())
                .or_insert_with(|| self.new_slot());
            let now = Instant::now();
            let start = match slot.next_start {
                Some(next) if next > now => next,
                _ => now,
            };
            slot.next_start = Some(start + slot.delay);
            start - now
        };

        if !wait.is_zero() {
            debug!("Throttling {}: waiting {:?}", domain, wait);
            tokio::time::sleep(wait).await;
        }

        DomainPermit {
            domain,
            _permit: permit,
        }
    }

    /// Feed a finished download back into the domain's delay.
    pub async fn record(&self, domain: &str, latency: Duration, success: bool) {
        let mut domains = self.domains.lock().await;
        if let Some(slot) = domains.get_mut(domain) {
            let updated = next_delay(&self.config, slot.delay, latency, success);
            if updated != slot.delay {
                debug!(
                    "Autothrottle {}: delay {:?} -> {:?} (latency {:?})",
                    domain, slot.delay, updated, latency
                );
                slot.delay = updated;
            }
        }
    }

    pub async fn current_delay(&self, domain: &str) -> Option<Duration> {
        let domains = self.domains.lock().await;
        domains.get(domain).map(|slot| slot.delay)
    }

    fn new_slot(&self) -> DomainSlot {
        DomainSlot {
            delay: self.config.download_delay,
            next_start: None,
            permits: Arc::new(Semaphore::new(self.config.per_domain)),
        }
    }
}

/// Autothrottle delay update.
pub fn next_delay(
    config: &ThrottleConfig,
    current: Duration,
    latency: Duration,
    success: bool,
) -> Duration {
    if !config.autothrottle {
        return current;
    }

    let target = latency.as_secs_f64() / config.target_concurrency;
    let mean = (current.as_secs_f64() + target) / 2.0;
    let proposed = target
        .max(mean)
        .min(config.max_delay.as_secs_f64())
        .max(config.download_delay.as_secs_f64());
    let proposed = Duration::from_secs_f64(proposed);

    if !success && proposed < current {
        return current;
    }
    proposed
}
