use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

/// Cairn build orchestrator.
///
/// Discovers component manifests across a source tree, fetches missing
/// dependencies, and drives GNU make over the resulting build actions.
///
/// EXAMPLES:
///     cairn build                  Build every discovered component
///     cairn build app --dry-run    Write cairn.mk for app without running make
///     cairn plan app               Show the resolved actions for app
///     cairn list --json            List components as JSON
///     cairn fetch                  Fetch every declared dependency
///
/// ENVIRONMENT VARIABLES:
///     CAIRN_JSON        Set to '1' for JSON output by default
///     CAIRN_JOBS        Parallel jobs passed to make
///     CAIRN_BUILD_DIR   Override the build directory
///     RUST_LOG          Log filter (overrides -v/-q)
///     NO_COLOR          Set to disable colored output
#[derive(Parser)]
#[command(name = "cairn")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Run as if started in DIR
    #[arg(short = 'C', long = "directory", global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Quiet logging (warnings and errors only)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve targets and run the build
    ///
    /// Without targets, every discovered component is built. The generated
    /// makefile declares `all` over the requested targets and `tests` over
    /// every test component.
    ///
    /// EXAMPLES:
    ///     cairn build                  Build everything
    ///     cairn build app tool -j 8    Build two targets with 8 jobs
    ///     cairn build --dry-run        Only write build/cairn.mk
    #[command(visible_alias = "b")]
    Build {
        /// Components to build
        targets: Vec<String>,
        /// Write the makefile without running it
        #[arg(long)]
        dry_run: bool,
        /// Number of parallel jobs
        #[arg(long, short = 'j')]
        jobs: Option<usize>,
    },

    /// Show the build actions for a target
    ///
    /// EXAMPLES:
    ///     cairn plan app           Actions in emission order
    ///     cairn plan app --json    Same, as JSON
    Plan {
        /// Component to resolve
        target: String,
        /// JSON output
        #[arg(long, env = "CAIRN_JSON")]
        json: bool,
    },

    /// List discovered components
    #[command(visible_alias = "ls")]
    List {
        /// JSON output
        #[arg(long, env = "CAIRN_JSON")]
        json: bool,
    },

    /// Fetch dependencies without building
    ///
    /// EXAMPLES:
    ///     cairn fetch          Fetch every dependency in cairn.toml
    ///     cairn fetch zlib     Fetch one dependency
    Fetch {
        /// Dependencies to fetch (default: all)
        names: Vec<String>,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cli_config = config::Config::from_env();

    if cli_config.no_color {
        colored::control::set_override(false);
    }
    init_logging(cli.verbose, cli.quiet);

    let project_dir = cli.directory;
    match cli.command {
        Commands::Build {
            targets,
            dry_run,
            jobs,
        } => {
            let args = commands::build::BuildArgs {
                targets,
                dry_run,
                jobs,
                quiet: cli.quiet,
                project_dir,
            };
            commands::build::run(args)?;
        }
        Commands::Plan { target, json } => {
            // Command-line flag overrides environment variable
            let use_json = json || cli_config.default_json;
            commands::plan::run(&target, use_json, project_dir.as_deref())?;
        }
        Commands::List { json } => {
            let use_json = json || cli_config.default_json;
            commands::list::run(use_json, project_dir.as_deref())?;
        }
        Commands::Fetch { names } => {
            commands::fetch::run(&names, project_dir.as_deref())?;
        }
    }

    Ok(())
}
