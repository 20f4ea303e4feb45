#![allow(dead_code)]

use anyhow::{bail, Result};
use assert_cmd::cargo;
use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// A project directory whose settings point every endpoint at `base`.
pub fn setup_project(base: &str) -> TempDir {
    let dir = TempDir::new().expect("failed to create project dir");
    write_project(dir.path(), base);
    dir
}

pub fn write_project(dir: &Path, base: &str) {
    let config = format!(
        r#"[project]
name = "test-project"

[settings]
SEC_TICKERS_URL = "{base}/files/company_tickers.json"
SEC_SUBMISSIONS_URL = "{base}/submissions"
SEC_ARCHIVES_URL = "{base}/Archives/edgar/data"
YAHOO_RSS_URL = "{base}/rss/headline"
YAHOO_CHART_URL = "{base}/v8/finance/chart"
OPENAI_BASE_URL = "{base}/v1"
DOWNLOAD_DELAY = 0
AUTOTHROTTLE_ENABLED = false
RETRY_TIMES = 1
CLOSESPIDER_ITEMCOUNT = 0
DATA_DIR = "data"

[settings.ITEM_PIPELINES]
sqlite = 300
lake = 400
"#
    );
    std::fs::write(dir.join("stockscraper.toml"), config).expect("failed to write project file");
}

pub fn base_cmd(project: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("stockscraper"));
    cmd.current_dir(project);
    cmd.env_remove("STOCKSCRAPER_PROJECT");
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("OPENAI_API_KEY");
    cmd.arg("--no-color");
    cmd
}

pub fn run_cmd(project: &Path, args: &[&str]) -> Result<Output> {
    let mut cmd = base_cmd(project);
    cmd.args(args);
    let output = cmd.output()?;
    if !output.status.success() {
        bail!(
            "command failed: {:?}\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(output)
}

pub fn run_cmd_json(project: &Path, args: &[&str]) -> Result<Value> {
    let output = run_cmd(project, args)?;
    let stdout = String::from_utf8(output.stdout)?;
    Ok(serde_json::from_str(&stdout)?)
}

pub fn show_json(project: &Path, ticker: &str) -> Result<Value> {
    run_cmd_json(project, &["show", ticker, "--json"])
}

pub fn status_json(project: &Path) -> Result<Value> {
    run_cmd_json(project, &["db", "status", "--json"])
}
