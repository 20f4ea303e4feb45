//! Item pipelines
//!
//! Every scraped item passes through the enabled stages in `ITEM_PIPELINES`
//! priority order. A stage returns the (possibly modified) item, or fails
//! with [`ScrapeError::DropItem`] to stop it from reaching later stages.

pub mod lake;
pub mod sentiment;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error};

use crate::config::Settings;
use crate::error::ScrapeError;
use crate::items::ScrapedItem;

pub use lake::LakePipeline;
pub use sentiment::SentimentPipeline;
pub use sqlite::SqlitePipeline;

/// Names accepted in `ITEM_PIPELINES`.
pub const PIPELINE_NAMES: &[&str] = &["sentiment", "sqlite", "lake"];

#[async_trait]
pub trait ItemPipeline: Send {
    fn name(&self) -> &'static str;

    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    async fn process_item(&mut self, item: ScrapedItem) -> Result<ScrapedItem>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The ordered stages for one crawl.
#[derive(Default)]
pub struct PipelineChain {
    stages: Vec<Box<dyn ItemPipeline>>,
}

impl PipelineChain {
    pub fn new(stages: Vec<Box<dyn ItemPipeline>>) -> Self {
        Self { stages }
    }

    /// Build the stages named in `ITEM_PIPELINES`, lowest priority first.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut stages: Vec<Box<dyn ItemPipeline>> = Vec::new();
        for name in settings.ordered_pipelines() {
            let stage: Box<dyn ItemPipeline> = match name.as_str() {
                "sentiment" => Box::new(SentimentPipeline::from_settings(settings)?),
                "sqlite" => Box::new(SqlitePipeline::new(settings.warehouse_path())),
                "lake" => Box::new(LakePipeline::new(settings.lake_path())),
                other => {
                    return Err(ScrapeError::invalid_setting(
                        "ITEM_PIPELINES",
                        format!(
                            "unknown pipeline {} (expected one of: {})",
                            other,
                            PIPELINE_NAMES.join(", ")
                        ),
                    )
                    .into())
                }
            };
            stages.push(stage);
        }
        Ok(Self { stages })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub async fn open(&mut self) -> Result<()> {
        for stage in &mut self.stages {
            debug!("Opening pipeline {}", stage.name());
            stage.open().await?;
        }
        Ok(())
    }

    pub async fn process(&mut self, mut item: ScrapedItem) -> Result<ScrapedItem> {
        for stage in &mut self.stages {
            item = stage.process_item(item).await?;
        }
        Ok(item)
    }

    /// Close every stage even if an earlier one fails; the first error wins.
    pub async fn close(&mut self) -> Result<()> {
        let mut first_error = None;
        for stage in &mut self.stages {
            if let Err(err) = stage.close().await {
                error!("Pipeline {} failed to close: {:#}", stage.name(), err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
