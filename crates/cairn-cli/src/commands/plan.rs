//! Plan command - show the actions a target resolves into

use super::{load_config, open_session, shown, shown_all};
use anyhow::{Context, Result};
use cairn_build::{Fetcher, RecordingEngine};
use colored::Colorize;
use std::path::Path;

pub fn run(target: &str, json: bool, project_dir: Option<&Path>) -> Result<()> {
    let config = load_config(project_dir)?;
    let mut session = open_session(&config)?;
    let mut engine = RecordingEngine::new();
    session
        .resolve(target, &mut engine, &Fetcher::system())
        .with_context(|| format!("Failed to resolve '{}'", target))?;
    session.save_lock().context("Failed to write lock file")?;

    if json {
        let rendered =
            serde_json::to_string_pretty(engine.actions()).context("Failed to serialize plan")?;
        println!("{}", rendered);
        return Ok(());
    }

    for (index, action) in engine.actions().iter().enumerate() {
        println!(
            "{:>3}. {} ({})",
            index + 1,
            action.target.bold(),
            action.kind.to_string().cyan()
        );
        if let Some(output) = action.output_file() {
            println!("       output:    {}", shown(&config, &output));
        }
        let includes = shown_all(&config, &action.include_paths);
        if !includes.is_empty() {
            println!("       includes:  {}", includes.join(" "));
        }
        if !action.libraries.is_empty() {
            println!("       libraries: {}", action.libraries.join(" "));
        }
        let search = shown_all(&config, &action.library_paths);
        if !search.is_empty() {
            println!("       search:    {}", search.join(" "));
        }
    }
    Ok(())
}
