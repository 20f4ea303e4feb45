//! Output formatting module for CLI display
//!
//! Tables and colored values for warehouse rows, kept apart from the
//! queries that produce them.

use crate::analysis::SentimentPoint;
use crate::db::{FilingRecord, NewsRecord, TickerSummary};
use crate::pricing::PriceHistory;
use crate::spiders::JobInfo;
use colored::Colorize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

/// Shorten `text` to at most `max` characters, marking the cut with `…`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept.trim_end())
}

pub fn format_bytes(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", size, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn format_sentiment(label: &str) -> String {
    match label {
        "Positive" => label.green().to_string(),
        "Negative" => label.red().to_string(),
        "Neutral" => label.yellow().to_string(),
        _ => label.bright_black().to_string(),
    }
}

pub fn format_score(score: f64) -> String {
    let text = format!("{:+.2}", score);
    if score > 0.0 {
        text.green().to_string()
    } else if score < 0.0 {
        text.red().to_string()
    } else {
        text
    }
}

pub fn format_jobs_table(jobs: &[JobInfo]) -> String {
    #[derive(Tabled)]
    struct JobRow {
        #[tabled(rename = "Job")]
        name: String,
        #[tabled(rename = "Arguments")]
        args: String,
        #[tabled(rename = "Description")]
        description: String,
    }

    let rows: Vec<JobRow> = jobs
        .iter()
        .map(|job| JobRow {
            name: job.name.to_string(),
            args: job
                .args
                .iter()
                .map(|a| format!("-a {}=...", a))
                .collect::<Vec<_>>()
                .join(" "),
            description: job.description.to_string(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn format_filings_table(filings: &[FilingRecord]) -> String {
    #[derive(Tabled)]
    struct FilingRow {
        #[tabled(rename = "Filed")]
        date: String,
        #[tabled(rename = "Form")]
        form: String,
        #[tabled(rename = "Sentiment")]
        sentiment: String,
        #[tabled(rename = "Score")]
        score: String,
        #[tabled(rename = "Summary")]
        summary: String,
    }

    let rows: Vec<FilingRow> = filings
        .iter()
        .map(|f| FilingRow {
            date: f
                .filing_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            form: f.form.clone(),
            sentiment: format_sentiment(&f.sentiment),
            score: format_score(f.sentiment_score),
            summary: truncate_chars(&f.summary_ai, 60),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(3..4), Alignment::right());
    table.to_string()
}

pub fn format_news_table(news: &[NewsRecord]) -> String {
    #[derive(Tabled)]
    struct NewsRow {
        #[tabled(rename = "Published")]
        published: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Sentiment")]
        sentiment: String,
        #[tabled(rename = "Score")]
        score: String,
    }

    let rows: Vec<NewsRow> = news
        .iter()
        .map(|n| NewsRow {
            published: n
                .published
                .map(|p| p.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            title: truncate_chars(&n.title, 70),
            sentiment: format_sentiment(&n.sentiment),
            score: format_score(n.sentiment_score),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(3..4), Alignment::right());
    table.to_string()
}

pub fn format_ticker_summary_table(summaries: &[TickerSummary]) -> String {
    #[derive(Tabled)]
    struct SummaryRow {
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Filings")]
        filings: i64,
        #[tabled(rename = "News")]
        news: i64,
    }

    let rows: Vec<SummaryRow> = summaries
        .iter()
        .map(|s| SummaryRow {
            ticker: s.ticker.clone(),
            filings: s.filings,
            news: s.news,
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

pub fn format_percent(pct: Option<f64>) -> String {
    match pct {
        Some(p) if p > 0.0 => format!("{:+.2}%", p).green().to_string(),
        Some(p) if p < 0.0 => format!("{:+.2}%", p).red().to_string(),
        Some(p) => format!("{:+.2}%", p),
        None => "N/A".bright_black().to_string(),
    }
}

pub fn format_price_summary(history: &PriceHistory) -> String {
    let currency = history.currency.as_deref().unwrap_or("");
    let price = |value: Option<f64>| {
        value
            .map(|v| format!("{:.2} {}", v, currency).trim_end().to_string())
            .unwrap_or_else(|| "N/A".to_string())
    };
    let closes: Vec<f64> = history.points.iter().map(|p| p.close).collect();

    let mut lines = vec![format!(
        "  {}",
        crate::pricing::sparkline(&closes, 60).cyan()
    )];
    lines.push(format!("  Last close:   {}", price(history.last_close()).bold()));
    lines.push(format!("  Last change:  {}", format_percent(history.last_change_pct)));
    lines.push(format!(
        "  {} change:   {}",
        history.period.as_str(),
        format_percent(history.period_change_pct)
    ));
    lines.push(format!(
        "  Range:        {} - {}",
        price(history.low()),
        price(history.high())
    ));
    lines.join("\n")
}

/// The most recent `limit` points of the news sentiment trend.
pub fn format_sentiment_trend_table(points: &[SentimentPoint], limit: usize) -> String {
    #[derive(Tabled)]
    struct TrendRow {
        #[tabled(rename = "Published")]
        published: String,
        #[tabled(rename = "Score")]
        score: String,
        #[tabled(rename = "Rolling mean")]
        rolling_mean: String,
    }

    let start = points.len().saturating_sub(limit);
    let rows: Vec<TrendRow> = points[start..]
        .iter()
        .map(|p| TrendRow {
            published: p.when.format("%Y-%m-%d %H:%M").to_string(),
            score: format_score(p.score),
            rolling_mean: format_score(p.rolling_mean),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}
