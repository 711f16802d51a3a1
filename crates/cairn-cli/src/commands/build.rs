//! Build command - resolve targets into cairn.mk and run make

use super::{load_config, open_session, shown};
use anyhow::{bail, Context, Result};
use cairn_build::{BuildEngine, Fetcher, MakefileEngine, ALL_ALIAS};
use colored::Colorize;
use std::path::PathBuf;

/// Build command arguments
#[derive(Default)]
pub struct BuildArgs {
    /// Components to build (default: all discovered)
    pub targets: Vec<String>,
    /// Write the makefile without running it
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: Option<usize>,
    /// Quiet output (errors only)
    pub quiet: bool,
    /// Project directory (defaults to current directory)
    pub project_dir: Option<PathBuf>,
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<()> {
    let mut config = load_config(args.project_dir.as_deref())?;
    if let Some(jobs) = args.jobs {
        config.project.engine.jobs = Some(jobs);
    }

    let mut session = open_session(&config)?;
    let targets: Vec<String> = if args.targets.is_empty() {
        session.graph().names().into_iter().map(str::to_string).collect()
    } else {
        args.targets.clone()
    };
    if targets.is_empty() {
        bail!(
            "No components found under {}",
            config.project_root().display()
        );
    }

    let mut engine = MakefileEngine::system(&config.layout, &config.project.engine);
    let fetcher = Fetcher::system();
    let stats = session
        .resolve_all(&targets, &mut engine, &fetcher)
        .context("Resolution failed")?;

    if args.dry_run {
        let makefile = engine.write().context("Failed to write makefile")?;
        if !args.quiet {
            println!(
                "{} {} ({} actions, {} fetched)",
                "Wrote".green().bold(),
                shown(&config, &makefile),
                stats.actions,
                stats.fetched
            );
        }
        return Ok(());
    }

    let result = engine.execute(&[ALL_ALIAS.to_string()]);
    if let Some(output) = engine.last_output() {
        if !args.quiet || result.is_err() {
            print!("{}", output.stdout);
        }
        if result.is_err() {
            eprint!("{}", output.stderr);
        }
    }
    result.context("Build failed")?;

    if !args.quiet {
        println!(
            "{} {} target(s): {} actions, {} fetched, {} discovered in {:.2}s",
            "Built".green().bold(),
            stats.targets,
            stats.actions,
            stats.fetched,
            stats.discovered,
            stats.elapsed.as_secs_f64()
        );
    }
    Ok(())
}
