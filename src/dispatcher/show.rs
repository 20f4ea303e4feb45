use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use rusqlite::Connection;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::warn;

use crate::analysis::{self, SentimentPoint, TREND_WINDOW};
use crate::cli::formatters;
use crate::commands::ShowOptions;
use crate::config::{Project, Settings};
use crate::db::{self, FilingRecord, NewsRecord};
use crate::llm::ChatClient;
use crate::pricing::{yahoo, PriceHistory};
use crate::ui;

const FILINGS_LIMIT: usize = 50;
const NEWS_LIMIT: usize = 200;
/// Trend rows printed; JSON carries all of them.
const TREND_ROWS: usize = 10;

/// One filing or news row reduced to what the extremes view shows.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Highlight {
    pub kind: &'static str,
    pub when: Option<DateTime<Utc>>,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub sentiment: String,
    pub sentiment_score: f64,
}

#[derive(Debug, Serialize)]
pub struct TickerReport {
    pub ticker: String,
    pub price: Option<PriceHistory>,
    pub filings: Vec<FilingRecord>,
    pub news: Vec<NewsRecord>,
    pub most_positive: Option<Highlight>,
    pub most_negative: Option<Highlight>,
    pub sentiment_trend: Vec<SentimentPoint>,
    pub insights: Option<String>,
}

impl TickerReport {
    fn empty(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            price: None,
            filings: Vec::new(),
            news: Vec::new(),
            most_positive: None,
            most_negative: None,
            sentiment_trend: Vec::new(),
            insights: None,
        }
    }
}

fn highlights(filings: &[FilingRecord], news: &[NewsRecord]) -> Vec<Highlight> {
    let filings = filings.iter().map(|f| Highlight {
        kind: "FILING",
        when: f
            .filing_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc()),
        title: if f.form.is_empty() {
            "Filing".to_string()
        } else {
            f.form.clone()
        },
        url: f.report_url.clone(),
        summary: f.summary_ai.clone(),
        sentiment: f.sentiment.clone(),
        sentiment_score: f.sentiment_score,
    });
    let news = news.iter().map(|n| Highlight {
        kind: "NEWS",
        when: n.published,
        title: if n.title.is_empty() {
            "News".to_string()
        } else {
            n.title.clone()
        },
        url: n.link.clone(),
        summary: n.summary_ai.clone(),
        sentiment: n.sentiment.clone(),
        sentiment_score: n.sentiment_score,
    });
    filings.chain(news).collect()
}

/// Newest first, undated rows last.
fn newest_first(a: &Option<DateTime<Utc>>, b: &Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Highest (or lowest) score across filings and news; ties go to the newest.
pub fn extreme(items: &[Highlight], most_positive: bool) -> Option<Highlight> {
    items
        .iter()
        .min_by(|a, b| {
            let by_score = if most_positive {
                b.sentiment_score.total_cmp(&a.sentiment_score)
            } else {
                a.sentiment_score.total_cmp(&b.sentiment_score)
            };
            by_score.then_with(|| newest_first(&a.when, &b.when))
        })
        .cloned()
}

pub fn build_report(conn: &Connection, ticker: &str) -> Result<TickerReport> {
    let filings = db::recent_filings(conn, Some(ticker), FILINGS_LIMIT)?;
    let news = db::recent_news(conn, Some(ticker), NEWS_LIMIT)?;
    let combined = highlights(&filings, &news);
    Ok(TickerReport {
        ticker: ticker.to_string(),
        price: None,
        most_positive: extreme(&combined, true),
        most_negative: extreme(&combined, false),
        sentiment_trend: analysis::sentiment_trend(&news, TREND_WINDOW),
        filings,
        news,
        insights: None,
    })
}

/// Messages about optional sections that could not be filled.
#[derive(Debug, Default)]
struct Notes {
    price: Option<String>,
    insights: Option<String>,
}

async fn add_price(
    report: &mut TickerReport,
    settings: &Settings,
    options: &ShowOptions,
    notes: &mut Notes,
) {
    let fetched =
        yahoo::fetch_price_history(settings, &report.ticker, options.period, options.interval)
            .await;
    match fetched {
        Ok(history) if !history.points.is_empty() => report.price = Some(history),
        Ok(_) => notes.price = Some(format!("No price data for {}.", report.ticker)),
        Err(err) => {
            warn!("Price fetch for {} failed: {:#}", report.ticker, err);
            notes.price = Some(format!("Could not fetch price data for {}.", report.ticker));
        }
    }
}

async fn add_insights(report: &mut TickerReport, chat: &ChatClient, notes: &mut Notes) {
    if !chat.is_configured() {
        notes.insights = Some("Set OPENAI_API_KEY to generate insights.".to_string());
        return;
    }
    if report.filings.is_empty() && report.news.is_empty() {
        notes.insights = Some("Not enough data to generate insights.".to_string());
        return;
    }

    let prompt = analysis::insights_prompt(
        &report.ticker,
        &report.filings,
        &report.news,
        report.price.as_ref(),
    );
    match analysis::generate_insights(chat, &prompt).await {
        Ok(text) => report.insights = Some(text),
        Err(err) => {
            warn!("Insights for {} failed: {:#}", report.ticker, err);
            notes.insights = Some(format!("Failed to generate AI insights: {:#}", err));
        }
    }
}

fn print_highlight(label: String, item: &Highlight) {
    let date = item
        .when
        .map(|w| w.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "N/A".to_string());
    println!("{}", label);
    println!("  {} ({}) {}", item.title.bold(), item.kind, date.bright_black());
    println!(
        "  Sentiment: {} ({})",
        formatters::format_sentiment(&item.sentiment),
        formatters::format_score(item.sentiment_score)
    );
    if !item.summary.is_empty() {
        println!("  {}", formatters::truncate_chars(&item.summary, 120));
    }
    if !item.url.is_empty() {
        println!("  {}", item.url.bright_black());
    }
}

fn print_report(report: &TickerReport, options: &ShowOptions, notes: &Notes) {
    if options.prices {
        println!(
            "{}",
            ui::section(&format!(
                "Price: {} ({}, {} candles)",
                report.ticker,
                options.period.as_str(),
                options.interval.as_str()
            ))
        );
        match (&report.price, &notes.price) {
            (Some(history), _) => println!("{}", formatters::format_price_summary(history)),
            (None, Some(note)) => println!("{}", ui::warning(note)),
            (None, None) => {}
        }
    }

    if let (Some(best), Some(worst)) = (&report.most_positive, &report.most_negative) {
        println!("{}", ui::section("Most Extreme Sentiments (Filings + News)"));
        print_highlight(format!("{} Most Positive", "📈".green().bold()), best);
        print_highlight(format!("{} Most Negative", "📉".red().bold()), worst);
    }

    println!(
        "{}",
        ui::section(&format!("Recent SEC Filings ({})", report.filings.len()))
    );
    if report.filings.is_empty() {
        println!("{}", ui::info("No filings yet. Run the sec_filings job."));
    } else {
        println!("{}", formatters::format_filings_table(&report.filings));
    }

    println!(
        "{}",
        ui::section(&format!("Latest News ({})", report.news.len()))
    );
    if report.news.is_empty() {
        println!("{}", ui::info("No news yet. Run the yahoo_news_rss job."));
    } else {
        println!("{}", formatters::format_news_table(&report.news));
    }

    println!("{}", ui::section("News Sentiment Over Time"));
    if report.sentiment_trend.is_empty() {
        println!("{}", ui::info("No dated news with sentiment scores to chart."));
    } else {
        let means: Vec<f64> = report.sentiment_trend.iter().map(|p| p.rolling_mean).collect();
        println!(
            "  {} ({}-item rolling mean)",
            crate::pricing::sparkline(&means, 60).cyan(),
            TREND_WINDOW
        );
        println!(
            "{}",
            formatters::format_sentiment_trend_table(&report.sentiment_trend, TREND_ROWS)
        );
    }

    if options.insights {
        println!("{}", ui::section("Actionable Insights (Generated by AI)"));
        match (&report.insights, &notes.insights) {
            (Some(text), _) => println!("{}", text),
            (None, Some(note)) => println!("{}", ui::warning(note)),
            (None, None) => {}
        }
    }
}

pub async fn dispatch_show(
    project: &Project,
    ticker: &str,
    options: ShowOptions,
    json_output: bool,
) -> Result<()> {
    let settings = project.settings()?;
    let ticker = ticker.trim().to_ascii_uppercase();
    let path = settings.warehouse_path();

    if !path.exists() {
        if json_output {
            println!("{}", serde_json::to_string_pretty(&TickerReport::empty(&ticker))?);
        } else {
            println!(
                "{}",
                ui::info(&format!(
                    "No warehouse at {}. Run: stockscraper run --ticker {}",
                    path.display(),
                    ticker
                ))
            );
        }
        return Ok(());
    }

    let mut report = {
        let conn = db::init_database(&path)?;
        build_report(&conn, &ticker)?
    };

    let mut notes = Notes::default();
    if options.prices {
        add_price(&mut report, &settings, &options, &mut notes).await;
    }
    if options.insights {
        let chat = ChatClient::from_settings(&settings)?;
        add_insights(&mut report, &chat, &mut notes).await;
    }

    if json_output {
        for note in [&notes.price, &notes.insights].into_iter().flatten() {
            warn!("{}", note);
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &options, &notes);
    }
    Ok(())
}
