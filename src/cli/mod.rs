pub mod formatters;
pub mod runner;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::pricing::{PriceInterval, PricePeriod};

#[derive(Parser)]
#[command(name = "stockscraper")]
#[command(version, about = "Crawl SEC filings and Yahoo Finance news into a local warehouse", long_about = None)]
pub struct Cli {
    /// Project directory (defaults to the nearest directory holding stockscraper.toml)
    #[arg(long, global = true, env = "STOCKSCRAPER_PROJECT", value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Log level
    #[arg(
        short = 'L',
        long = "loglevel",
        global = true,
        value_enum,
        ignore_case = true,
        default_value_t = LogLevel::Info
    )]
    pub loglevel: LogLevel,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Scrapy-style log level names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Critical,
    Error,
    #[value(alias = "WARN")]
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    /// The `tracing` filter directive for this level. There is no level above
    /// error in `tracing`, so CRITICAL shows errors only.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Critical | LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a job
    Crawl {
        /// Job name (see `stockscraper list`)
        job: String,

        /// Job argument, repeatable
        #[arg(short = 'a', value_name = "NAME=VALUE")]
        args: Vec<String>,

        /// Setting override, repeatable
        #[arg(short = 's', long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
    },

    /// List available jobs
    List,

    /// Create a new project
    Init {
        /// Directory to create the project in
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Run both jobs for one ticker
    Run {
        /// Ticker symbol (e.g. AAPL)
        #[arg(long)]
        ticker: String,

        /// SEC CIK, skips the ticker lookup
        #[arg(long)]
        cik: Option<String>,

        /// Stop each job after this many items
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show stored filings and news for a ticker
    Show {
        /// Ticker symbol
        ticker: String,

        /// Price history period
        #[arg(long, value_enum, default_value_t = PricePeriod::SixMonths)]
        period: PricePeriod,

        /// Price candle interval
        #[arg(long, value_enum, default_value_t = PriceInterval::Daily)]
        interval: PriceInterval,

        /// Skip the price history
        #[arg(long)]
        no_price: bool,

        /// Generate actionable insights with OpenAI (needs OPENAI_API_KEY)
        #[arg(long)]
        insights: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect the warehouse
    Db {
        #[command(subcommand)]
        action: DbCommands,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Data directory listing, row counts and samples
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
