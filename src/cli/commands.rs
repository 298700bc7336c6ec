//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - start: begin a fresh loop and run it
//! - stop / pause: deactivate the stored loop
//! - resume / run: continue the stored loop
//! - status / log / config / context: read-only views

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use ralph::domain::PromptSource;
use ralph::manager::{DEFAULT_LOG_ENTRIES, StartRequest};

/// Ralph - drive an agent command in a resumable loop until the task is done
#[derive(Parser, Debug)]
#[command(name = "ralph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Working directory holding the task and the state directory
    #[arg(short = 'C', long, global = true)]
    pub workdir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a fresh loop and run it
    Start(StartArgs),

    /// Stop the loop (a running loop stops after its current iteration)
    Stop,

    /// Pause the loop; resume continues with counters intact
    Pause,

    /// Reactivate an inactive loop and run it
    Resume,

    /// Run the stored loop, e.g. after a crash
    Run,

    /// Show loop status
    Status,

    /// Show recent iteration history
    Log {
        /// Number of entries to show
        #[arg(short, long, default_value_t = DEFAULT_LOG_ENTRIES)]
        last: usize,
    },

    /// Print the stored loop state as JSON
    Config,

    /// Print the current carryover context
    Context,
}

#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Inline task prompt
    #[arg(required_unless_present = "prompt_file", conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// Read the task prompt from this file (relative to the working directory)
    #[arg(short = 'f', long)]
    pub prompt_file: Option<String>,

    /// Completion token the agent prints when the task is done
    #[arg(long)]
    pub completion: Option<String>,

    #[arg(long)]
    pub max_iterations: Option<u32>,

    #[arg(long)]
    pub max_runtime_minutes: Option<u64>,

    /// Stop after this many successful iterations without changes
    #[arg(long)]
    pub no_change_limit: Option<u32>,

    /// Stop after this many identical consecutive errors
    #[arg(long)]
    pub repeat_error_limit: Option<u32>,

    /// Refuse to start on a dirty working tree (true/false)
    #[arg(long)]
    pub require_clean_start: Option<bool>,

    /// Extra file or glob to include ahead of the prompt (repeatable)
    #[arg(short, long = "input")]
    pub inputs: Vec<String>,
}

impl StartArgs {
    pub fn to_request(&self) -> StartRequest {
        let prompt = match (&self.prompt_file, &self.prompt) {
            (Some(path), _) => Some(PromptSource::file(path.clone())),
            (None, Some(text)) => Some(PromptSource::inline(text.clone())),
            (None, None) => None,
        };

        StartRequest {
            prompt,
            completion_token: self.completion.clone(),
            max_iterations: self.max_iterations,
            max_runtime_minutes: self.max_runtime_minutes,
            no_change_limit: self.no_change_limit,
            repeat_error_limit: self.repeat_error_limit,
            require_clean_start: self.require_clean_start,
            additional_inputs: (!self.inputs.is_empty()).then(|| self.inputs.clone()),
        }
    }
}
