use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockscraper::cli::{runner, Cli, LogLevel};
use stockscraper::{dispatcher, ui};

fn init_logging(level: LogLevel, ansi: bool) {
    // RUST_LOG wins over -L when set.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{},hyper=warn,reqwest=warn", level.as_filter()).into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(ansi),
        )
        .init();
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if cli.no_color {
        ui::disable_color();
    }
    init_logging(cli.loglevel, !cli.no_color);

    let result = match runner::to_internal_command(&cli.command) {
        Ok((command, json_output)) => {
            dispatcher::dispatch_command(command, cli.project_dir.as_deref(), json_output).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
