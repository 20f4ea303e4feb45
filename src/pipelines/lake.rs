use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::ItemPipeline;
use crate::db::{FilingRecord, NewsRecord};
use crate::items::ScrapedItem;

/// Snapshots each crawl's items as timestamped CSV files under the lake
/// directory: `sec_filings_<YYYYmmdd_HHMMSS>.csv` and `news_<...>.csv`.
pub struct LakePipeline {
    dir: PathBuf,
    filings: Vec<FilingRecord>,
    news: Vec<NewsRecord>,
}

impl LakePipeline {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            filings: Vec::new(),
            news: Vec::new(),
        }
    }
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    writer.flush()?;
    Ok(())
}

#[async_trait]
impl ItemPipeline for LakePipeline {
    fn name(&self) -> &'static str {
        "lake"
    }

    async fn open(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
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
            warn!("No items to save to the lake");
            return Ok(());
        }

        let ts = Utc::now().format("%Y%m%d_%H%M%S");
        if !self.filings.is_empty() {
            let path = self.dir.join(format!("sec_filings_{}.csv", ts));
            write_csv(&path, &self.filings)?;
            info!("Saved {} SEC filings to {}", self.filings.len(), path.display());
        }
        if !self.news.is_empty() {
            let path = self.dir.join(format!("news_{}.csv", ts));
            write_csv(&path, &self.news)?;
            info!("Saved {} news items to {}", self.news.len(), path.display());
        }
        self.filings.clear();
        self.news.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::NewsItem;

    #[tokio::test]
    async fn writes_one_file_per_kind_seen() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("lake");
        let mut pipeline = LakePipeline::new(dir.clone());
        pipeline.open().await.unwrap();

        for n in 0..3 {
            pipeline
                .process_item(ScrapedItem::News(NewsItem {
                    ticker: "AAPL".to_string(),
                    title: format!("Headline, with comma {}", n),
                    link: format!("https://finance.yahoo.com/news/{}", n),
                    ..Default::default()
                }))
                .await
                .unwrap();
        }
        pipeline.close().await.unwrap();

        let files: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("news_") && files[0].ends_with(".csv"));

        let mut reader = csv::Reader::from_path(dir.join(&files[0])).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "ticker");
        assert!(headers.iter().any(|h| h == "sentiment_score"));
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[1][2], "Headline, with comma 1");
    }

    #[tokio::test]
    async fn empty_crawl_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut pipeline = LakePipeline::new(tmp.path().join("lake"));
        pipeline.open().await.unwrap();
        pipeline.close().await.unwrap();
        assert_eq!(std::fs::read_dir(tmp.path().join("lake")).unwrap().count(), 0);
    }
}
