use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use ralph::config::Config;
use ralph::domain::{HistoryEntry, IterationResult, LoopState, StopReason};
use ralph::environment::GitEnvironment;
use ralph::manager::LoopManager;
use ralph::orchestrator::Orchestrator;
use ralph::prompt::PromptBuilder;
use ralph::runner::IterationRunner;
use ralph::storage::LoopStorage;
use ralph::work_unit::CommandWorkUnit;

mod cli;

use cli::Cli;
use cli::commands::Commands;

type Manager = LoopManager<CommandWorkUnit, GitEnvironment>;

fn setup_logging(default_filter: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ralph")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("ralph.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn build_manager(config: &Config, workdir: PathBuf) -> Manager {
    let state_dir = config.state_dir(&workdir);
    let storage = LoopStorage::open(&state_dir);

    // Paths under the state directory never count as uncommitted work
    let ignore_dir = state_dir
        .strip_prefix(&workdir)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let environment = GitEnvironment::new(&workdir, ignore_dir, config.git_options());

    let work_unit = CommandWorkUnit::new(&config.work_unit.command, &workdir, config.work_unit.timeout_ms);
    let prompt_builder = PromptBuilder::new(&workdir).with_plan_file(&config.plan_file);
    let runner = IterationRunner::new(Arc::new(work_unit), prompt_builder);

    let orchestrator =
        Orchestrator::new(storage, runner, Arc::new(environment)).with_options(config.orchestrator_options());
    LoopManager::new(workdir, orchestrator, config.looping.clone())
}

fn colored_reason(reason: StopReason) -> ColoredString {
    match reason {
        StopReason::CompletionPromise => reason.as_str().green(),
        StopReason::MaxIterations | StopReason::MaxRuntime => reason.as_str().yellow(),
        _ if reason.is_user_initiated() => reason.as_str().yellow(),
        _ => reason.as_str().red(),
    }
}

fn print_stopped(reason: StopReason) {
    println!("{} {} ({})", "Loop stopped:".cyan(), colored_reason(reason), reason.describe());
}

fn print_status(state: &LoopState) {
    let status = if state.active { "Active".green() } else { "Stopped".yellow() };
    println!("{} {}", "Status:".cyan(), status);
    println!("Iteration: {}/{}", state.iteration, state.max_iterations);
    println!("Started: {}", state.started_at.to_rfc3339());
    println!("Last iteration: {}", state.last_iteration_at.to_rfc3339());
    match state.stop_reason {
        Some(reason) => println!("Stop reason: {} ({})", colored_reason(reason), reason.describe()),
        None => println!("Stop reason: None"),
    }
    println!(
        "Counters: no-progress {}/{}, repeated-error {}/{}",
        state.no_progress_count,
        state.safety.no_change_limit,
        state.consecutive_error_count,
        state.safety.repeat_error_limit
    );
    println!("Last summary: {}", state.last_summary);
}

fn print_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No history found.");
        return;
    }
    for entry in entries {
        let result = match entry.result {
            IterationResult::Done => entry.result.as_str().green(),
            IterationResult::Error => entry.result.as_str().red(),
            _ => entry.result.as_str().normal(),
        };
        println!("Iteration {} ({}): {}", entry.iteration, result, entry.notes);
        if !entry.changed_resources.is_empty() {
            println!("  Changed: {}", entry.changed_resources.join(", "));
        }
    }
}

async fn run_application(cli: &Cli, config: &Config, workdir: PathBuf) -> Result<()> {
    info!("Starting application in {}", workdir.display());

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let manager = build_manager(config, workdir);

    match &cli.command {
        Commands::Start(args) => {
            println!("{}", "Loop started. Running iterations...".cyan());
            let reason = manager.start(args.to_request()).await.context("Failed to start loop")?;
            print_stopped(reason);
        }
        Commands::Stop => {
            manager.stop().context("Failed to stop loop")?;
            println!("{}", "Loop stop requested.".yellow());
        }
        Commands::Pause => {
            manager.pause().context("Failed to pause loop")?;
            println!("{}", "Loop paused.".yellow());
        }
        Commands::Resume => {
            println!("{}", "Resuming loop...".cyan());
            let reason = manager.resume().await.context("Failed to resume loop")?;
            print_stopped(reason);
        }
        Commands::Run => {
            let reason = manager.run().await.context("Failed to run loop")?;
            print_stopped(reason);
        }
        Commands::Status => print_status(&manager.status().context("Failed to read loop state")?),
        Commands::Log { last } => print_history(&manager.log(*last).context("Failed to read history")?),
        Commands::Config => println!("{}", manager.show_config().context("Failed to read loop state")?),
        Commands::Context => {
            let context = manager.context().context("Failed to read context")?;
            if context.trim().is_empty() {
                println!("No context found.");
            } else {
                println!("{}", context);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    let workdir = match &cli.workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    // Load configuration; it names the default log filter
    let config = Config::load(cli.config.as_ref(), &workdir).context("Failed to load configuration")?;

    setup_logging(config.log_filter()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config, workdir).await.context("Application failed")?;

    Ok(())
}
