use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

use crate::cli::formatters;
use crate::config::{Project, Settings};
use crate::db::{self, TickerSummary};
use crate::items::ItemKind;
use crate::ui;

const SAMPLE_SIZE: usize = 3;

#[derive(Debug, Serialize, PartialEq)]
pub struct DataFile {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct FilingSample {
    pub ticker: String,
    pub form: String,
    pub filing_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewsSample {
    pub ticker: String,
    pub source: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct WarehouseStatus {
    pub path: String,
    pub size: u64,
    pub sec_filings: i64,
    pub news: i64,
    pub tickers: Vec<TickerSummary>,
    pub sample_filings: Vec<FilingSample>,
    pub sample_news: Vec<NewsSample>,
}

#[derive(Debug, Serialize)]
pub struct DataStatus {
    pub data_dir: String,
    pub files: Vec<DataFile>,
    pub warehouse: Option<WarehouseStatus>,
}

/// Every file under `dir`, as paths relative to `root`, sorted.
fn collect_files(root: &Path, dir: &Path, out: &mut Vec<DataFile>) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let meta = entry.metadata()?;
        if meta.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            out.push(DataFile {
                path: relative.display().to_string(),
                size: meta.len(),
            });
        }
    }
    Ok(())
}

fn warehouse_status(path: &Path) -> Result<WarehouseStatus> {
    let conn = db::init_database(path)?;
    let sample_filings = db::recent_filings(&conn, None, SAMPLE_SIZE)?
        .into_iter()
        .map(|f| FilingSample {
            ticker: f.ticker,
            form: f.form,
            filing_date: f.filing_date.map(|d| d.to_string()),
        })
        .collect();
    let sample_news = db::recent_news(&conn, None, SAMPLE_SIZE)?
        .into_iter()
        .map(|n| NewsSample {
            ticker: n.ticker,
            source: n.source,
            title: n.title,
        })
        .collect();

    Ok(WarehouseStatus {
        path: path.display().to_string(),
        size: fs::metadata(path)?.len(),
        sec_filings: db::count_rows(&conn, ItemKind::Filing)?,
        news: db::count_rows(&conn, ItemKind::News)?,
        tickers: db::ticker_summaries(&conn)?,
        sample_filings,
        sample_news,
    })
}

pub fn collect_status(settings: &Settings) -> Result<DataStatus> {
    let data_dir = settings.data_path();
    let mut files = Vec::new();
    if data_dir.is_dir() {
        collect_files(&data_dir, &data_dir, &mut files)?;
    }

    let warehouse_path = settings.warehouse_path();
    let warehouse = if warehouse_path.is_file() {
        Some(warehouse_status(&warehouse_path)?)
    } else {
        None
    };

    Ok(DataStatus {
        data_dir: data_dir.display().to_string(),
        files,
        warehouse,
    })
}

fn print_status(status: &DataStatus) {
    println!("{}", ui::section("Data directory"));
    println!("{}", status.data_dir.bright_black());
    if status.files.is_empty() {
        println!("{}", ui::warning("No data files yet"));
    } else {
        #[derive(Tabled)]
        struct FileRow {
            #[tabled(rename = "File")]
            path: String,
            #[tabled(rename = "Size")]
            size: String,
        }
        let rows: Vec<FileRow> = status
            .files
            .iter()
            .map(|f| FileRow {
                path: f.path.clone(),
                size: formatters::format_bytes(f.size),
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    println!("{}", ui::section("Warehouse"));
    let Some(warehouse) = &status.warehouse else {
        println!("{}", ui::failure("Warehouse does not exist yet"));
        return;
    };

    println!(
        "{}",
        ui::success(&format!(
            "{} ({})",
            warehouse.path,
            formatters::format_bytes(warehouse.size)
        ))
    );
    println!("  SEC filings: {}", warehouse.sec_filings.to_string().green());
    println!("  News articles: {}", warehouse.news.to_string().green());

    if !warehouse.tickers.is_empty() {
        println!(
            "\n{}",
            formatters::format_ticker_summary_table(&warehouse.tickers)
        );
    }

    if !warehouse.sample_filings.is_empty() {
        println!("\n{}", "Sample filings:".bold());
        for s in &warehouse.sample_filings {
            println!(
                "  - {} {} {}",
                s.ticker,
                s.form,
                s.filing_date.as_deref().unwrap_or("N/A")
            );
        }
    }
    if !warehouse.sample_news.is_empty() {
        println!("\n{}", "Sample news:".bold());
        for s in &warehouse.sample_news {
            println!(
                "  - {} [{}] {}",
                s.ticker,
                s.source,
                formatters::truncate_chars(&s.title, 80)
            );
        }
    }
}

pub fn dispatch_status(project: &Project, json_output: bool) -> Result<()> {
    let settings = project.settings()?;
    let status = collect_status(&settings)?;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}
