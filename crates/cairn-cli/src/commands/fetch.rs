//! Fetch command - materialize dependencies without building

use super::{load_config, open_session, shown};
use anyhow::{Context, Result};
use cairn_build::{FetchOutcome, Fetcher};
use colored::Colorize;
use std::path::Path;

pub fn run(names: &[String], project_dir: Option<&Path>) -> Result<()> {
    let config = load_config(project_dir)?;
    let mut session = open_session(&config)?;

    if names.is_empty() && session.descriptors().is_empty() {
        println!("No dependencies declared");
        return Ok(());
    }

    let reports = session
        .fetch_all(names, &Fetcher::system())
        .context("Fetch failed")?;

    for report in &reports {
        let status = match report.outcome {
            FetchOutcome::Fetched => "fetched".green().bold(),
            FetchOutcome::AlreadyPresent => "already present".dimmed(),
        };
        println!(
            "{:<24} {}  {}",
            report.name,
            status,
            shown(&config, &report.path)
        );
    }
    Ok(())
}
