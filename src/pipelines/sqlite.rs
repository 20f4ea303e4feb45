use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tracing::{info, warn};

use super::ItemPipeline;
use crate::db::{self, FilingRecord, NewsRecord};
use crate::items::ScrapedItem;

/// Buffers items and writes them to the warehouse in one transaction when
/// the crawl closes.
pub struct SqlitePipeline {
    path: PathBuf,
    filings: Vec<FilingRecord>,
    news: Vec<NewsRecord>,
}

impl SqlitePipeline {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            filings: Vec::new(),
            news: Vec::new(),
        }
    }
}

#[async_trait]
impl ItemPipeline for SqlitePipeline {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn open(&mut self) -> Result<()> {
        // Fail before crawling if the warehouse is unusable.
        db::init_database(&self.path)?;
        info!("Warehouse: {}", self.path.display());
        Ok(())
    }

    async fn process_item(&mut self, item: ScrapedItem) -> Result<ScrapedItem> {
        let now = Utc::now();
        match &item {
            ScrapedItem::Filing(f) => self.filings.push(FilingRecord::from_item(f, now)),
            ScrapedItem::News(n) => self.news.push(NewsRecord::from_item(n, now)),
        }
        Ok(item)
    }

    async fn close(&mut self) -> Result<()> {
        if self.filings.is_empty() && self.news.is_empty() {
            warn!("No items to store in the warehouse");
            return Ok(());
        }
        let mut conn = db::init_database(&self.path)?;
        db::store_records(&mut conn, &self.filings, &self.news)?;
        self.filings.clear();
        self.news.clear();
        Ok(())
    }
}
