#![allow(dead_code)]

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

pub fn open_warehouse(data_dir: &Path) -> Result<Connection> {
    let path = data_dir.join("warehouse.db");
    Connection::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

/// (cik, ticker, form, filing_date, sentiment) ordered by filing date.
pub fn filing_rows(
    conn: &Connection,
) -> Result<Vec<(String, String, String, Option<String>, String)>> {
    let mut stmt = conn.prepare(
        "SELECT cik, ticker, form, filing_date, sentiment FROM sec_filings ORDER BY filing_date",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    })?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub fn first_report_text(conn: &Connection) -> Result<String> {
    let text = conn.query_row(
        "SELECT report_text FROM sec_filings ORDER BY id LIMIT 1",
        [],
        |row| row.get(0),
    )?;
    Ok(text)
}

/// (ticker, source, title, article_text) in insertion order.
pub fn news_rows(conn: &Connection) -> Result<Vec<(String, String, String, String)>> {
    let mut stmt =
        conn.prepare("SELECT ticker, source, title, article_text FROM news ORDER BY id")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub fn count(conn: &Connection, table: &str) -> Result<i64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(count)
}
