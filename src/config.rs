//! Project discovery and layered crawl settings
//!
//! A project is a directory holding `stockscraper.toml`. Settings are layered
//! from lowest to highest priority: built-in defaults, the project file's
//! `[settings]` table, job-specific settings, then `-s KEY=VALUE` overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ScrapeError;

pub const PROJECT_FILE: &str = "stockscraper.toml";

/// Every key accepted by [`Settings::apply`].
pub const SETTING_KEYS: &[&str] = &[
    "BOT_NAME",
    "USER_AGENT",
    "ROBOTSTXT_OBEY",
    "DOWNLOAD_DELAY",
    "DOWNLOAD_TIMEOUT",
    "CONCURRENT_REQUESTS",
    "CONCURRENT_REQUESTS_PER_DOMAIN",
    "AUTOTHROTTLE_ENABLED",
    "AUTOTHROTTLE_MAX_DELAY",
    "AUTOTHROTTLE_TARGET_CONCURRENCY",
    "RETRY_ENABLED",
    "RETRY_TIMES",
    "CLOSESPIDER_ITEMCOUNT",
    "ITEM_PIPELINES",
    "OPENAI_MODEL",
    "OPENAI_BASE_URL",
    "DATA_DIR",
    "SEC_CONTACT",
    "SEC_TICKERS_URL",
    "SEC_SUBMISSIONS_URL",
    "SEC_ARCHIVES_URL",
    "YAHOO_RSS_URL",
    "YAHOO_CHART_URL",
];

const DEFAULT_PROJECT_FILE: &str = r#"# stockscraper project configuration
[project]
name = "stockscraper"

[settings]
ROBOTSTXT_OBEY = true
DOWNLOAD_DELAY = 0.5
CONCURRENT_REQUESTS = 8
AUTOTHROTTLE_ENABLED = true
CLOSESPIDER_ITEMCOUNT = 20
DATA_DIR = "data"

[settings.ITEM_PIPELINES]
sentiment = 200
sqlite = 300
lake = 400
"#;

#[derive(Debug, Default, Deserialize)]
struct ProjectFile {
    #[serde(default)]
    project: ProjectSection,
    #[serde(default)]
    settings: toml::Table,
}

#[derive(Debug, Deserialize)]
struct ProjectSection {
    #[serde(default = "default_project_name")]
    name: String,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: default_project_name(),
        }
    }
}

fn default_project_name() -> String {
    "stockscraper".to_string()
}

/// A located project directory and its parsed configuration.
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub name: String,
    settings: toml::Table,
}

impl Project {
    /// Find the project containing `start` (or one of its ancestors).
    pub fn discover(start: &Path) -> Result<Self> {
        let start = if start.is_absolute() {
            start.to_path_buf()
        } else {
            std::env::current_dir()?.join(start)
        };

        for dir in start.ancestors() {
            let candidate = dir.join(PROJECT_FILE);
            if candidate.is_file() {
                return Self::load(dir);
            }
        }

        Err(ScrapeError::NoActiveProject(start.display().to_string()).into())
    }

    /// Load the project rooted exactly at `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(PROJECT_FILE);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: ProjectFile =
            toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(Self {
            root: root.to_path_buf(),
            name: file.project.name,
            settings: file.settings,
        })
    }

    /// Write a default project file into `dir`. Refuses to overwrite.
    pub fn init(dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        std::fs::write(&path, DEFAULT_PROJECT_FILE)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Defaults plus this project's `[settings]` table.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::default();
        settings.root = self.root.clone();
        for (key, value) in &self.settings {
            settings.apply_toml(key, value)?;
        }
        if let Ok(contact) = std::env::var("SEC_CONTACT_EMAIL") {
            if !contact.trim().is_empty() {
                settings.sec_contact = contact.trim().to_string();
            }
        }
        Ok(settings)
    }
}

/// Effective crawl settings.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub bot_name: String,
    pub user_agent: Option<String>,
    pub robotstxt_obey: bool,
    pub download_delay: f64,
    pub download_timeout: f64,
    pub concurrent_requests: usize,
    pub concurrent_requests_per_domain: usize,
    pub autothrottle_enabled: bool,
    pub autothrottle_max_delay: f64,
    pub autothrottle_target_concurrency: f64,
    pub retry_enabled: bool,
    pub retry_times: u32,
    pub closespider_itemcount: usize,
    pub item_pipelines: BTreeMap<String, i64>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub data_dir: PathBuf,
    pub sec_contact: String,
    pub sec_tickers_url: String,
    pub sec_submissions_url: String,
    pub sec_archives_url: String,
    pub yahoo_rss_url: String,
    pub yahoo_chart_url: String,
    /// Directory relative paths resolve against (the project root).
    #[serde(skip)]
    pub root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let mut item_pipelines = BTreeMap::new();
        item_pipelines.insert("sentiment".to_string(), 200);
        item_pipelines.insert("sqlite".to_string(), 300);
        item_pipelines.insert("lake".to_string(), 400);

        Self {
            bot_name: "stockscraper".to_string(),
            user_agent: None,
            robotstxt_obey: true,
            download_delay: 0.5,
            download_timeout: 30.0,
            concurrent_requests: 8,
            concurrent_requests_per_domain: 8,
            autothrottle_enabled: true,
            autothrottle_max_delay: 60.0,
            autothrottle_target_concurrency: 1.0,
            retry_enabled: true,
            retry_times: 2,
            closespider_itemcount: 20,
            item_pipelines,
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            data_dir: PathBuf::from("data"),
            sec_contact: "contact@example.com".to_string(),
            sec_tickers_url: "https://www.sec.gov/files/company_tickers.json".to_string(),
            sec_submissions_url: "https://data.sec.gov/submissions".to_string(),
            sec_archives_url: "https://www.sec.gov/Archives/edgar/data".to_string(),
            yahoo_rss_url: "https://feeds.finance.yahoo.com/rss/2.0/headline".to_string(),
            yahoo_chart_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
            root: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// User agent sent with every request.
    pub fn user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(|| {
            format!(
                "{}/{} (+https://github.com/stockscraper/stockscraper)",
                self.bot_name,
                env!("CARGO_PKG_VERSION")
            )
        })
    }

    pub fn download_delay(&self) -> Duration {
        Duration::from_secs_f64(self.download_delay)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.download_timeout)
    }

    /// Data directory, resolved against the project root.
    pub fn data_path(&self) -> PathBuf {
        self.root.join(&self.data_dir)
    }

    pub fn warehouse_path(&self) -> PathBuf {
        self.data_path().join("warehouse.db")
    }

    pub fn lake_path(&self) -> PathBuf {
        self.data_path().join("lake")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_path().join("cache")
    }

    /// Apply `-s KEY=VALUE` style overrides in order.
    pub fn apply_overrides(&mut self, overrides: &[(String, String)]) -> Result<()> {
        for (key, value) in overrides {
            self.apply(key, value)?;
        }
        Ok(())
    }

    /// Apply a single setting given as text.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "BOT_NAME" => self.bot_name = non_empty(key, value)?,
            "USER_AGENT" => self.user_agent = Some(non_empty(key, value)?),
            "ROBOTSTXT_OBEY" => self.robotstxt_obey = parse_bool(key, value)?,
            "DOWNLOAD_DELAY" => self.download_delay = parse_seconds(key, value)?,
            "DOWNLOAD_TIMEOUT" => self.download_timeout = parse_seconds(key, value)?,
            "CONCURRENT_REQUESTS" => self.concurrent_requests = parse_positive(key, value)?,
            "CONCURRENT_REQUESTS_PER_DOMAIN" => {
                self.concurrent_requests_per_domain = parse_positive(key, value)?
            }
            "AUTOTHROTTLE_ENABLED" => self.autothrottle_enabled = parse_bool(key, value)?,
            "AUTOTHROTTLE_MAX_DELAY" => self.autothrottle_max_delay = parse_seconds(key, value)?,
            "AUTOTHROTTLE_TARGET_CONCURRENCY" => {
                let target = parse_seconds(key, value)?;
                if target == 0.0 {
                    return Err(ScrapeError::invalid_setting(key, "must be greater than 0").into());
                }
                self.autothrottle_target_concurrency = target;
            }
            "RETRY_ENABLED" => self.retry_enabled = parse_bool(key, value)?,
            "RETRY_TIMES" => {
                self.retry_times = value
                    .parse()
                    .map_err(|_| ScrapeError::invalid_setting(key, "expected an integer"))?
            }
            "CLOSESPIDER_ITEMCOUNT" => {
                self.closespider_itemcount = value
                    .parse()
                    .map_err(|_| ScrapeError::invalid_setting(key, "expected an integer"))?
            }
            "ITEM_PIPELINES" => self.item_pipelines = parse_pipelines(key, value)?,
            "OPENAI_MODEL" => self.openai_model = non_empty(key, value)?,
            "OPENAI_BASE_URL" => self.openai_base_url = parse_url(key, value)?,
            "DATA_DIR" => self.data_dir = PathBuf::from(non_empty(key, value)?),
            "SEC_CONTACT" => self.sec_contact = non_empty(key, value)?,
            "SEC_TICKERS_URL" => self.sec_tickers_url = parse_url(key, value)?,
            "SEC_SUBMISSIONS_URL" => self.sec_submissions_url = parse_url(key, value)?,
            "SEC_ARCHIVES_URL" => self.sec_archives_url = parse_url(key, value)?,
            "YAHOO_RSS_URL" => self.yahoo_rss_url = parse_url(key, value)?,
            "YAHOO_CHART_URL" => self.yahoo_chart_url = parse_url(key, value)?,
            _ => {
                return Err(ScrapeError::invalid_setting(key, "unknown setting").into());
            }
        }
        Ok(())
    }

    /// Apply a setting read from the project file.
    fn apply_toml(&mut self, key: &str, value: &toml::Value) -> Result<()> {
        match (key, value) {
            ("ITEM_PIPELINES", toml::Value::Table(table)) => {
                let mut pipelines = BTreeMap::new();
                for (name, priority) in table {
                    let priority = priority.as_integer().ok_or_else(|| {
                        ScrapeError::invalid_setting(key, format!("priority of {} must be an integer", name))
                    })?;
                    pipelines.insert(name.clone(), priority);
                }
                self.item_pipelines = pipelines;
                Ok(())
            }
            (_, toml::Value::String(s)) => self.apply(key, s),
            (_, toml::Value::Integer(i)) => self.apply(key, &i.to_string()),
            (_, toml::Value::Float(f)) => self.apply(key, &f.to_string()),
            (_, toml::Value::Boolean(b)) => self.apply(key, &b.to_string()),
            _ => Err(ScrapeError::invalid_setting(key, "unsupported value type").into()),
        }
    }

    /// Enabled pipeline names ordered by priority (lowest first).
    pub fn ordered_pipelines(&self) -> Vec<String> {
        let mut entries: Vec<(&String, &i64)> = self.item_pipelines.iter().collect();
        entries.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        entries.into_iter().map(|(name, _)| name.clone()).collect()
    }
}

fn non_empty(key: &str, value: &str) -> Result<String> {
    if value.is_empty() {
        return Err(ScrapeError::invalid_setting(key, "must not be empty").into());
    }
    Ok(value.to_string())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ScrapeError::invalid_setting(key, "expected true or false").into()),
    }
}

/// Upper bound for every delay or timeout setting: one day.
const MAX_SECONDS: f64 = 86_400.0;

fn parse_seconds(key: &str, value: &str) -> Result<f64> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| ScrapeError::invalid_setting(key, "expected a number"))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(ScrapeError::invalid_setting(key, "must be a non-negative number").into());
    }
    if parsed > MAX_SECONDS {
        return Err(ScrapeError::invalid_setting(key, "must be at most 86400 seconds").into());
    }
    Ok(parsed)
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ScrapeError::invalid_setting(key, "expected a positive integer").into()),
    }
}

fn parse_url(key: &str, value: &str) -> Result<String> {
    reqwest::Url::parse(value)
        .map_err(|e| ScrapeError::invalid_setting(key, e.to_string()))?;
    Ok(value.trim_end_matches('/').to_string())
}

/// Accepts a JSON object (`{"sqlite": 300}`) or `name=priority` pairs
/// separated by commas (`sqlite=300,lake=400`). An empty value disables
/// every pipeline.
fn parse_pipelines(key: &str, value: &str) -> Result<BTreeMap<String, i64>> {
    if value.is_empty() {
        return Ok(BTreeMap::new());
    }
    if value.starts_with('{') {
        return serde_json::from_str(value)
            .map_err(|e| ScrapeError::invalid_setting(key, e.to_string()).into());
    }

    let mut pipelines = BTreeMap::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, priority) = part
            .split_once('=')
            .ok_or_else(|| ScrapeError::invalid_setting(key, format!("expected name=priority, got {}", part)))?;
        let priority: i64 = priority
            .trim()
            .parse()
            .map_err(|_| ScrapeError::invalid_setting(key, format!("bad priority for {}", name)))?;
        pipelines.insert(name.trim().to_string(), priority);
    }
    Ok(pipelines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn overrides_apply_in_order() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(&[
                ("DOWNLOAD_DELAY".to_string(), "2".to_string()),
                ("DOWNLOAD_DELAY".to_string(), "0.25".to_string()),
                ("ROBOTSTXT_OBEY".to_string(), "False".to_string()),
                ("CLOSESPIDER_ITEMCOUNT".to_string(), "5".to_string()),
            ])
            .unwrap();

        assert_eq!(settings.download_delay, 0.25);
        assert!(!settings.robotstxt_obey);
        assert_eq!(settings.closespider_itemcount, 5);
    }

    #[test]
    fn largest_durations_convert() {
        let mut settings = Settings::default();
        settings.apply("DOWNLOAD_DELAY", "86400").unwrap();
        settings.apply("DOWNLOAD_TIMEOUT", "86400").unwrap();
        assert_eq!(settings.download_delay(), Duration::from_secs(86_400));
        assert_eq!(settings.download_timeout(), Duration::from_secs(86_400));
    }

    #[test]
    fn unknown_and_malformed_settings_are_rejected() {
        let mut settings = Settings::default();
        assert!(settings.apply("DOWNLOAD_DELAYS", "1").is_err());
        assert!(settings.apply("DOWNLOAD_DELAY", "soon").is_err());
        assert!(settings.apply("DOWNLOAD_DELAY", "-1").is_err());
        assert!(settings.apply("DOWNLOAD_DELAY", "1e20").is_err());
        assert!(settings.apply("DOWNLOAD_TIMEOUT", "86401").is_err());
        assert!(settings.apply("AUTOTHROTTLE_MAX_DELAY", "inf").is_err());
        assert!(settings.apply("CONCURRENT_REQUESTS", "0").is_err());
        assert!(settings.apply("SEC_TICKERS_URL", "not a url").is_err());
    }

    #[test]
    fn pipelines_accept_json_and_pairs() {
        let mut settings = Settings::default();
        settings
            .apply("ITEM_PIPELINES", r#"{"lake": 100, "sqlite": 300}"#)
            .unwrap();
        assert_eq!(settings.ordered_pipelines(), vec!["lake", "sqlite"]);

        settings.apply("ITEM_PIPELINES", "sqlite=10, sentiment=20").unwrap();
        assert_eq!(settings.ordered_pipelines(), vec!["sqlite", "sentiment"]);

        settings.apply("ITEM_PIPELINES", "").unwrap();
        assert!(settings.ordered_pipelines().is_empty());
    }

    #[test]
    fn default_pipeline_order_matches_priorities() {
        let settings = Settings::default();
        assert_eq!(
            settings.ordered_pipelines(),
            vec!["sentiment", "sqlite", "lake"]
        );
    }

    #[test]
    fn discover_walks_up_to_project_root() {
        let tmp = TempDir::new().unwrap();
        Project::init(tmp.path()).unwrap();
        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let project = Project::discover(&nested).unwrap();
        assert_eq!(project.root, tmp.path());
        assert_eq!(project.name, "stockscraper");

        let settings = project.settings().unwrap();
        assert_eq!(settings.closespider_itemcount, 20);
        assert_eq!(settings.data_path(), tmp.path().join("data"));
        assert_eq!(settings.ordered_pipelines().len(), 3);
    }

    #[test]
    fn discover_without_project_fails() {
        let tmp = TempDir::new().unwrap();
        let err = Project::discover(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("no active project"));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        Project::init(tmp.path()).unwrap();
        assert!(Project::init(tmp.path()).is_err());
    }

    #[test]
    fn project_file_settings_are_applied() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(PROJECT_FILE),
            r#"
[project]
name = "research"

[settings]
DOWNLOAD_DELAY = 2
AUTOTHROTTLE_ENABLED = false
USER_AGENT = "research-bot/2.0"

[settings.ITEM_PIPELINES]
sqlite = 1
"#,
        )
        .unwrap();

        let project = Project::load(tmp.path()).unwrap();
        let settings = project.settings().unwrap();
        assert_eq!(project.name, "research");
        assert_eq!(settings.download_delay, 2.0);
        assert!(!settings.autothrottle_enabled);
        assert_eq!(settings.user_agent(), "research-bot/2.0");
        assert_eq!(settings.ordered_pipelines(), vec!["sqlite"]);
    }

    #[test]
    fn bundled_scraper_project_loads() {
        let project = Project::load(&Path::new(env!("CARGO_MANIFEST_DIR")).join("scraper")).unwrap();
        let settings = project.settings().unwrap();
        assert_eq!(settings.closespider_itemcount, 20);
        assert_eq!(settings.ordered_pipelines(), vec!["sentiment", "sqlite", "lake"]);
        assert!(settings.data_path().ends_with("scraper/data"));
    }
}
