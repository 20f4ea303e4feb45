//! stockscraper - SEC filings and Yahoo Finance news crawler
//!
//! This library provides the crawl engine, the two scraping jobs, the item
//! pipelines and the SQLite warehouse behind the `stockscraper` binary.

pub mod analysis;
pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod items;
pub mod llm;
pub mod pipelines;
pub mod pricing;
pub mod sec;
pub mod spiders;
pub mod text;
pub mod ui;
