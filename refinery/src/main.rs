//! `refinery` command line.
//!
//! Reads `refinery.json` from the project directory, installs the filters it
//! declares and runs the pipeline.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use refinery::context::{Interrupt, RunContext};
use refinery::core::definition::FilterDefinition;
use refinery::core::paths::{PIPELINE_FILE, config_path, dot_root};
use refinery::engine::{PipelineOutcome, check_pipeline, run_pipeline};
use refinery::exit_codes;
use refinery::install::Installer;
use refinery::io::config::{RuntimeConfig, load_config, set_unlocked};
use refinery::io::git::{GitFetcher, GitVersionResolver};
use refinery::io::pipeline::{Pipeline, load_pipeline};
use refinery::io::process::SubprocessRunner;
use refinery::logging;

#[derive(Parser)]
#[command(
    name = "refinery",
    version,
    about = "Runs content-build filters over a project tree"
)]
struct Cli {
    /// Project directory containing refinery.json.
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download remote filters and install Python dependencies.
    Install {
        /// Reinstall filters that are already downloaded.
        #[arg(short, long)]
        force: bool,
        /// Filters to install; all defined filters when empty.
        filters: Vec<String>,
    },
    /// Remove a downloaded filter from the cache.
    Uninstall { filter: String },
    /// Run the pipeline.
    Run,
    /// Check that every filter in the pipeline can run.
    Check,
    /// Allow remote filters from untrusted sources.
    Unlock,
    /// Only allow remote filters from the standard library.
    Lock,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let project = cli.project.as_path();
    match cli.command {
        Command::Install { force, filters } => cmd_install(project, force, &filters),
        Command::Uninstall { filter } => cmd_uninstall(project, &filter),
        Command::Run => cmd_run(project),
        Command::Check => cmd_check(project),
        Command::Unlock => cmd_set_unlocked(project, true),
        Command::Lock => cmd_set_unlocked(project, false),
    }
}

fn load_project(project: &Path) -> Result<(RuntimeConfig, Pipeline)> {
    let config = load_config(&config_path(&dot_root(project)))?;
    let pipeline = load_pipeline(&project.join(PIPELINE_FILE))?;
    Ok((config, pipeline))
}

fn defined<'p>(pipeline: &'p Pipeline, id: &str) -> Result<&'p FilterDefinition> {
    pipeline
        .definition(id)
        .with_context(|| format!("filter '{id}' is not defined in {PIPELINE_FILE}"))
}

fn cmd_install(project: &Path, force: bool, filters: &[String]) -> Result<i32> {
    let (config, pipeline) = load_project(project)?;
    let selected: Vec<&FilterDefinition> = if filters.is_empty() {
        pipeline.definitions.values().collect()
    } else {
        filters
            .iter()
            .map(|id| defined(&pipeline, id))
            .collect::<Result<_>>()?
    };
    if selected.is_empty() {
        bail!("no filters defined in {PIPELINE_FILE}");
    }

    let process = SubprocessRunner;
    let installer = Installer::new(
        project,
        &pipeline.data_path,
        &config.interpreter.candidates,
        &process,
        &GitFetcher,
        &GitVersionResolver,
    );
    installer.install_all(selected, force).context("install failed")?;
    info!("All filters installed.");
    Ok(exit_codes::OK)
}

fn cmd_uninstall(project: &Path, filter: &str) -> Result<i32> {
    let (config, pipeline) = load_project(project)?;
    defined(&pipeline, filter)?;
    let process = SubprocessRunner;
    let installer = Installer::new(
        project,
        &pipeline.data_path,
        &config.interpreter.candidates,
        &process,
        &GitFetcher,
        &GitVersionResolver,
    );
    match installer.uninstall(filter) {
        Ok(()) => info!("Filter {filter} uninstalled."),
        Err(err) => warn!(err = %err, "could not remove filter {filter}"),
    }
    Ok(exit_codes::OK)
}

fn cmd_run(project: &Path) -> Result<i32> {
    let (config, pipeline) = load_project(project)?;
    let runners = pipeline.runners()?;

    let interrupt = Interrupt::new();
    let handle = interrupt.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current filter.");
        handle.trigger();
    })
    .context("install Ctrl-C handler")?;

    let process = SubprocessRunner;
    let ctx = RunContext::new(project, &config, &process, interrupt);
    match run_pipeline(&runners, &ctx)? {
        PipelineOutcome::Completed => {
            info!("Pipeline finished.");
            Ok(exit_codes::OK)
        }
        PipelineOutcome::Interrupted { completed } => {
            warn!("Pipeline interrupted after {completed} of {} filters.", runners.len());
            Ok(exit_codes::INTERRUPTED)
        }
    }
}

fn cmd_check(project: &Path) -> Result<i32> {
    let (config, pipeline) = load_project(project)?;
    let runners = pipeline.runners()?;
    let process = SubprocessRunner;
    let ctx = RunContext::new(project, &config, &process, Interrupt::new());
    check_pipeline(&runners, &ctx)?;
    info!("All {} filters are ready.", runners.len());
    Ok(exit_codes::OK)
}

fn cmd_set_unlocked(project: &Path, unlocked: bool) -> Result<i32> {
    let path = config_path(&dot_root(project));
    set_unlocked(&path, unlocked)?;
    if unlocked {
        warn!("Safe mode is off. Remote filters from any source can run.");
    } else {
        info!("Safe mode is on.");
    }
    Ok(exit_codes::OK)
}
