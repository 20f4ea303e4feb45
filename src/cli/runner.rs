use anyhow::Result;

use crate::cli::{Commands, DbCommands};
use crate::commands::{self as cmd, Command, ShowOptions};

/// Convert clap `Commands` into the internal `commands::Command`, splitting
/// `-a`/`-s` pairs. Returns the command and whether JSON output was asked for.
pub fn to_internal_command(c: &Commands) -> Result<(Command, bool)> {
    match c {
        Commands::Crawl { job, args, set } => Ok((
            Command::Crawl {
                job: job.clone(),
                args: cmd::parse_job_args(args)?,
                overrides: cmd::parse_overrides(set)?,
            },
            false,
        )),

        Commands::List => Ok((Command::List, false)),

        Commands::Init { dir } => Ok((Command::Init { dir: dir.clone() }, false)),

        Commands::Run { ticker, cik, limit } => Ok((
            Command::Run {
                ticker: ticker.clone(),
                cik: cik.clone(),
                limit: *limit,
            },
            false,
        )),

        Commands::Show {
            ticker,
            period,
            interval,
            no_price,
            insights,
            json,
        } => Ok((
            Command::Show {
                ticker: ticker.clone(),
                options: ShowOptions {
                    period: *period,
                    interval: *interval,
                    prices: !*no_price,
                    insights: *insights,
                },
            },
            *json,
        )),

        Commands::Db { action } => match action {
            DbCommands::Status { json } => Ok((Command::DbStatus, *json)),
        },
    }
}
