// Database module - SQLite warehouse connection and queries

pub mod models;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::items::ItemKind;
pub use models::{parse_filing_date, FilingRecord, NewsRecord};

/// Open a warehouse connection, creating the parent directory if needed
pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("Failed to open database at {:?}", path))?;
    Ok(conn)
}

/// Open the warehouse and make sure both tables exist
pub fn init_database(path: &Path) -> Result<Connection> {
    debug!("Initializing warehouse at: {:?}", path);
    let conn = open_db(path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    let schema_sql = include_str!("schema.sql");
    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")?;
    Ok(())
}

/// Insert filings in a single transaction, returns rows written
pub fn insert_filings(conn: &mut Connection, records: &[FilingRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    write_filings(&tx, records)?;
    tx.commit().context("Failed to commit filings")?;
    Ok(records.len())
}

/// Insert news rows in a single transaction, returns rows written
pub fn insert_news(conn: &mut Connection, records: &[NewsRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    write_news(&tx, records)?;
    tx.commit().context("Failed to commit news")?;
    Ok(records.len())
}

fn write_filings(conn: &Connection, records: &[FilingRecord]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let mut stmt = conn.prepare(
        "INSERT INTO sec_filings (
            cik, ticker, company_name, form, filing_date, accession_no,
            primary_doc, report_url, report_text, summary_ai, sentiment,
            sentiment_score, scraped_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    for r in records {
        stmt.execute(params![
            r.cik,
            r.ticker,
            r.company_name,
            r.form,
            r.filing_date,
            r.accession_no,
            r.primary_doc,
            r.report_url,
            r.report_text,
            r.summary_ai,
            r.sentiment,
            r.sentiment_score,
            r.scraped_at,
        ])
        .with_context(|| format!("Failed to insert filing {}", r.accession_no))?;
    }
    Ok(())
}

fn write_news(conn: &Connection, records: &[NewsRecord]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let mut stmt = conn.prepare(
        "INSERT INTO news (
            ticker, source, title, link, published, summary, article_text,
            summary_ai, sentiment, sentiment_score, scraped_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    for r in records {
        stmt.execute(params![
            r.ticker,
            r.source,
            r.title,
            r.link,
            r.published,
            r.summary,
            r.article_text,
            r.summary_ai,
            r.sentiment,
            r.sentiment_score,
            r.scraped_at,
        ])
        .with_context(|| format!("Failed to insert news item {}", r.link))?;
    }
    Ok(())
}

pub fn count_rows(conn: &Connection, kind: ItemKind) -> Result<i64> {
    // Table names come from ItemKind only.
    let sql = format!("SELECT COUNT(*) FROM {}", kind.as_str());
    let count = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count)
}

fn filing_from_row(row: &Row) -> rusqlite::Result<FilingRecord> {
    Ok(FilingRecord {
        cik: row.get(0)?,
        ticker: row.get(1)?,
        company_name: row.get(2)?,
        form: row.get(3)?,
        filing_date: row.get(4)?,
        accession_no: row.get(5)?,
        primary_doc: row.get(6)?,
        report_url: row.get(7)?,
        report_text: row.get(8)?,
        summary_ai: row.get(9)?,
        sentiment: row.get(10)?,
        sentiment_score: row.get(11)?,
        scraped_at: row.get(12)?,
    })
}

fn news_from_row(row: &Row) -> rusqlite::Result<NewsRecord> {
    Ok(NewsRecord {
        ticker: row.get(0)?,
        source: row.get(1)?,
        title: row.get(2)?,
        link: row.get(3)?,
        published: row.get(4)?,
        summary: row.get(5)?,
        article_text: row.get(6)?,
        summary_ai: row.get(7)?,
        sentiment: row.get(8)?,
        sentiment_score: row.get(9)?,
        scraped_at: row.get(10)?,
    })
}

/// Most recent filings, newest filing date first. `None` means every ticker.
pub fn recent_filings(
    conn: &Connection,
    ticker: Option<&str>,
    limit: usize,
) -> Result<Vec<FilingRecord>> {
    let mut stmt = conn.prepare(
        "SELECT cik, ticker, company_name, form, filing_date, accession_no,
                primary_doc, report_url, report_text, summary_ai, sentiment,
                sentiment_score, scraped_at
         FROM sec_filings
         WHERE ?1 IS NULL OR ticker = ?1
         ORDER BY filing_date IS NULL, filing_date DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![ticker, limit as i64], filing_from_row)?;
    let records = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read sec_filings")?;
    Ok(records)
}

/// Most recent news, newest publication first. `None` means every ticker.
pub fn recent_news(
    conn: &Connection,
    ticker: Option<&str>,
    limit: usize,
) -> Result<Vec<NewsRecord>> {
    let mut stmt = conn.prepare(
        "SELECT ticker, source, title, link, published, summary, article_text,
                summary_ai, sentiment, sentiment_score, scraped_at
         FROM news
         WHERE ?1 IS NULL OR ticker = ?1
         ORDER BY published IS NULL, published DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![ticker, limit as i64], news_from_row)?;
    let records = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read news")?;
    Ok(records)
}

/// Row counts per ticker across both tables.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TickerSummary {
    pub ticker: String,
    pub filings: i64,
    pub news: i64,
}

pub fn ticker_summaries(conn: &Connection) -> Result<Vec<TickerSummary>> {
    let mut stmt = conn.prepare(
        "SELECT ticker,
                SUM(CASE WHEN kind = 'filing' THEN 1 ELSE 0 END),
                SUM(CASE WHEN kind = 'news' THEN 1 ELSE 0 END)
         FROM (
             SELECT ticker, 'filing' AS kind FROM sec_filings
             UNION ALL
             SELECT ticker, 'news' AS kind FROM news
         )
         GROUP BY ticker
         ORDER BY ticker",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(TickerSummary {
            ticker: row.get(0)?,
            filings: row.get(1)?,
            news: row.get(2)?,
        })
    })?;
    let summaries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(summaries)
}

/// Write a buffered batch of both tables in one transaction, logging what
/// was stored. Nothing is kept if any row fails.
pub fn store_records(
    conn: &mut Connection,
    filings: &[FilingRecord],
    news: &[NewsRecord],
) -> Result<(usize, usize)> {
    let tx = conn.transaction()?;
    write_filings(&tx, filings)?;
    write_news(&tx, news)?;
    tx.commit().context("Failed to commit scraped items")?;

    info!(
        "Stored {} SEC filings and {} news items (totals: {} filings, {} news)",
        filings.len(),
        news.len(),
        count_rows(conn, ItemKind::Filing)?,
        count_rows(conn, ItemKind::News)?
    );
    Ok((filings.len(), news.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{NewsItem, SecFilingItem, Sentiment, SentimentLabel};
    use chrono::{TimeZone, Utc};

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn filing(ticker: &str, date: &str, accession: &str) -> FilingRecord {
        let item = SecFilingItem {
            cik: "0000320193".to_string(),
            ticker: ticker.to_string(),
            company_name: "Apple Inc.".to_string(),
            form: "10-Q".to_string(),
            filing_date: date.to_string(),
            accession_no: accession.to_string(),
            primary_doc: "aapl.htm".to_string(),
            report_url: format!("https://www.sec.gov/{}", accession),
            report_text: "Revenue grew".to_string(),
            sentiment: None,
        };
        FilingRecord::from_item(&item, Utc::now())
    }

    #[test]
    fn test_init_database_creates_tables() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("warehouse.db");

        init_database(&db_path).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('sec_filings', 'news')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 2);
    }

    #[test]
    fn test_filings_round_trip_newest_first() {
        let mut conn = memory_db();
        let records = vec![
            filing("AAPL", "2024-05-03", "a-1"),
            filing("AAPL", "2024-08-02", "a-2"),
            filing("AAPL", "garbage", "a-3"),
            filing("MSFT", "2024-07-30", "m-1"),
        ];
        assert_eq!(insert_filings(&mut conn, &records).unwrap(), 4);
        assert_eq!(count_rows(&conn, ItemKind::Filing).unwrap(), 4);

        let aapl = recent_filings(&conn, Some("AAPL"), 10).unwrap();
        let order: Vec<&str> = aapl.iter().map(|r| r.accession_no.as_str()).collect();
        assert_eq!(order, vec!["a-2", "a-1", "a-3"]);
        assert_eq!(aapl[2].filing_date, None);
        assert_eq!(aapl[0].sentiment, "Unknown");

        assert_eq!(recent_filings(&conn, None, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_news_round_trip_keeps_timestamps_and_sentiment() {
        let mut conn = memory_db();
        let published = Utc.with_ymd_and_hms(2024, 9, 10, 14, 30, 0).unwrap();
        let item = NewsItem {
            ticker: "AAPL".to_string(),
            source: "YahooFinanceRSS".to_string(),
            title: "Apple unveils new iPhone".to_string(),
            link: "https://finance.yahoo.com/news/iphone".to_string(),
            published: Some(published),
            sentiment: Some(Sentiment::new("Launch went well", SentimentLabel::Positive, 0.6)),
            ..Default::default()
        };
        let undated = NewsItem {
            published: None,
            link: "https://finance.yahoo.com/news/other".to_string(),
            ..item.clone()
        };
        let now = Utc::now();
        insert_news(
            &mut conn,
            &[NewsRecord::from_item(&undated, now), NewsRecord::from_item(&item, now)],
        )
        .unwrap();

        let rows = recent_news(&conn, Some("AAPL"), 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].published, Some(published));
        assert_eq!(rows[0].sentiment, "Positive");
        assert_eq!(rows[0].sentiment_score, 0.6);
        assert_eq!(rows[1].published, None);
        assert_eq!(rows[1].article_text, "");
    }

    #[test]
    fn test_store_records_is_all_or_nothing() {
        let mut conn = memory_db();
        conn.execute_batch(
            "CREATE TRIGGER reject_news BEFORE INSERT ON news
             BEGIN SELECT RAISE(ABORT, 'news rejected'); END;",
        )
        .unwrap();
        let news = NewsItem {
            ticker: "AAPL".to_string(),
            link: "https://x.test/a".to_string(),
            ..Default::default()
        };

        let result = store_records(
            &mut conn,
            &[filing("AAPL", "2024-05-03", "a-1")],
            &[NewsRecord::from_item(&news, Utc::now())],
        );

        assert!(result.is_err());
        assert_eq!(count_rows(&conn, ItemKind::Filing).unwrap(), 0);
        assert_eq!(count_rows(&conn, ItemKind::News).unwrap(), 0);
    }

    #[test]
    fn test_store_records_writes_both_tables() {
        let mut conn = memory_db();
        let news = NewsItem {
            ticker: "AAPL".to_string(),
            link: "https://x.test/a".to_string(),
            ..Default::default()
        };
        let written = store_records(
            &mut conn,
            &[filing("AAPL", "2024-05-03", "a-1")],
            &[NewsRecord::from_item(&news, Utc::now())],
        )
        .unwrap();
        assert_eq!(written, (1, 1));
        assert_eq!(count_rows(&conn, ItemKind::News).unwrap(), 1);
    }

    #[test]
    fn test_ticker_summaries_count_both_tables() {
        let mut conn = memory_db();
        insert_filings(
            &mut conn,
            &[filing("AAPL", "2024-05-03", "a-1"), filing("MSFT", "2024-05-03", "m-1")],
        )
        .unwrap();
        let news = NewsItem {
            ticker: "AAPL".to_string(),
            link: "https://x.test/a".to_string(),
            ..Default::default()
        };
        insert_news(&mut conn, &[NewsRecord::from_item(&news, Utc::now())]).unwrap();

        let summaries = ticker_summaries(&conn).unwrap();
        assert_eq!(
            summaries,
            vec![
                TickerSummary {
                    ticker: "AAPL".to_string(),
                    filings: 1,
                    news: 1
                },
                TickerSummary {
                    ticker: "MSFT".to_string(),
                    filings: 1,
                    news: 0
                },
            ]
        );
    }
}
