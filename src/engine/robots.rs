//! robots.txt fetching and matching.
//!
//! Rules are fetched once per origin. A missing, failing, unparsable or
//! non-2xx robots.txt allows everything.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::{Client, Url};
use texting_robots::Robot;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

/// Rules for one origin; `None` allows everything.
type OriginRules = Arc<OnceCell<Option<Robot>>>;

/// Per-origin robots.txt cache.
pub struct RobotsCache {
    client: Client,
    agent: String,
    origins: Mutex<HashMap<String, OriginRules>>,
}

impl RobotsCache {
    pub fn new(client: Client, user_agent: &str) -> Self {
        Self {
            client,
            agent: product_token(user_agent),
            origins: Mutex::new(HashMap::new()),
        }
    }

    pub async fn is_allowed(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        // The map lock only covers the lookup; the fetch runs under the
        // origin's own cell.
        let cell = {
            let mut origins = self.origins.lock().await;
            origins.entry(origin.clone()).or_default().clone()
        };

        let rules = cell
            .get_or_init(|| self.fetch_rules(&origin))
            .await;
        allows(rules.as_ref(), url)
    }

    async fn fetch_rules(&self, origin: &str) -> Option<Robot> {
        let robots_url = format!("{}/robots.txt", origin);
        debug!("Fetching {}", robots_url);
        match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(body) => parse_rules(&body, &self.agent),
                Err(e) => {
                    debug!("Failed to read {}: {}", robots_url, e);
                    None
                }
            },
            Ok(resp) => {
                debug!("{} returned {}", robots_url, resp.status());
                None
            }
            Err(e) => {
                debug!("Failed to fetch {}: {}", robots_url, e);
                None
            }
        }
    }
}

fn parse_rules(body: &[u8], agent: &str) -> Option<Robot> {
    match Robot::new(agent, body) {
        Ok(robot) => Some(robot),
        Err(e) => {
            debug!("Ignoring unparsable robots.txt: {}", e);
            None
        }
    }
}

fn allows(rules: Option<&Robot>, url: &Url) -> bool {
    rules.map_or(true, |robot| robot.allowed(url.as_str()))
}

/// `stockscraper/0.1 (+https://...)` is matched against robots.txt groups
/// as `stockscraper`.
fn product_token(user_agent: &str) -> String {
    user_agent
        .split_whitespace()
        .next()
        .and_then(|token| token.split('/').next())
        .filter(|token| !token.is_empty())
        .unwrap_or("*")
        .to_string()
}
