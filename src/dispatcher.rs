//! Command dispatcher that routes internal `Command` values to their
//! handlers.
//!
//! Every command except `list` and `init` runs inside a project, located from
//! `--project-dir` or the current directory.

mod crawl;
mod show;
mod status;

use anyhow::Result;
use std::path::Path;

use crate::cli::formatters;
use crate::commands::Command;
use crate::config::Project;
use crate::spiders::JOBS;
use crate::ui;

/// Route a parsed command to its handler
pub async fn dispatch_command(
    command: Command,
    project_dir: Option<&Path>,
    json_output: bool,
) -> Result<()> {
    match command {
        Command::List => {
            println!("{}", formatters::format_jobs_table(JOBS));
            Ok(())
        }
        Command::Init { dir } => init_project(&dir),
        Command::Crawl {
            job,
            args,
            overrides,
        } => {
            let project = locate_project(project_dir)?;
            crawl::dispatch_crawl(&project, &job, &args, &overrides).await
        }
        Command::Run { ticker, cik, limit } => {
            let project = locate_project(project_dir)?;
            crawl::dispatch_run(&project, &ticker, cik.as_deref(), limit).await
        }
        Command::Show { ticker, options } => {
            let project = locate_project(project_dir)?;
            show::dispatch_show(&project, &ticker, options, json_output).await
        }
        Command::DbStatus => {
            let project = locate_project(project_dir)?;
            status::dispatch_status(&project, json_output)
        }
    }
}

/// The project at or above `project_dir`, or above the working directory.
pub fn locate_project(project_dir: Option<&Path>) -> Result<Project> {
    match project_dir {
        Some(dir) => Project::discover(dir),
        None => Project::discover(&std::env::current_dir()?),
    }
}

fn init_project(dir: &Path) -> Result<()> {
    let path = Project::init(dir)?;
    println!("{}", ui::success(&format!("Created {}", path.display())));
    println!(
        "{}",
        ui::info(&format!(
            "Next: cd {} && stockscraper run --ticker AAPL",
            dir.display()
        ))
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_project_walks_up_from_given_dir() {
        let tmp = tempfile::tempdir().unwrap();
        Project::init(tmp.path()).unwrap();
        let nested = tmp.path().join("data").join("lake");
        std::fs::create_dir_all(&nested).unwrap();

        let project = locate_project(Some(&nested)).unwrap();
        assert_eq!(project.root, tmp.path());
        assert_eq!(project.name, "stockscraper");
    }

    #[test]
    fn locate_project_without_project_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = locate_project(Some(tmp.path())).unwrap_err();
        assert!(err.to_string().starts_with("no active project"));
    }

    #[tokio::test]
    async fn init_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("proj");
        dispatch_command(Command::Init { dir: dir.clone() }, None, false)
            .await
            .unwrap();
        assert!(dir.join("stockscraper.toml").is_file());

        let err = dispatch_command(Command::Init { dir }, None, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
