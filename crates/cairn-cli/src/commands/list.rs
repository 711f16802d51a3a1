//! List command - show discovered components

use super::{load_config, open_session, shown};
use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use std::path::Path;

pub fn run(json: bool, project_dir: Option<&Path>) -> Result<()> {
    let config = load_config(project_dir)?;
    let session = open_session(&config)?;
    let graph = session.graph();

    if json {
        let components: Vec<_> = graph
            .iter()
            .map(|(_, component)| {
                json!({
                    "name": component.name,
                    "kind": component.kind.name(),
                    "dependencies": component.dependencies,
                    "manifest": shown(&config, &component.manifest),
                })
            })
            .collect();
        let rendered = serde_json::to_string_pretty(&components)
            .context("Failed to serialize component list")?;
        println!("{}", rendered);
        return Ok(());
    }

    if graph.is_empty() {
        println!("No components found under {}", config.project_root().display());
        return Ok(());
    }

    for (_, component) in graph.iter() {
        let deps = if component.dependencies.is_empty() {
            String::new()
        } else {
            format!(" -> {}", component.dependencies.join(", "))
        };
        println!(
            "{:<24} {:<16}{}  {}",
            component.name.bold(),
            component.kind.name().cyan(),
            deps,
            shown(&config, &component.manifest).dimmed()
        );
    }
    Ok(())
}
