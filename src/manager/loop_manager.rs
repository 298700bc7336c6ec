//! Loop Manager implementation
//!
//! LoopManager is the command surface over one working directory: it writes
//! the state transitions users ask for and hands execution to the
//! orchestrator.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::LoopConfig;
use crate::domain::{HistoryEntry, LoopSettings, LoopState, PromptSource, SafetyLimits, StopReason};
use crate::environment::Environment;
use crate::error::{RalphError, Result};
use crate::orchestrator::Orchestrator;
use crate::storage::LoopStorage;
use crate::work_unit::WorkUnit;

/// Default number of entries shown by `log`
pub const DEFAULT_LOG_ENTRIES: usize = 5;

/// Parameters for a fresh loop; unset fields fall back to configured defaults
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    pub prompt: Option<PromptSource>,
    pub completion_token: Option<String>,
    pub max_iterations: Option<u32>,
    pub max_runtime_minutes: Option<u64>,
    pub no_change_limit: Option<u32>,
    pub repeat_error_limit: Option<u32>,
    pub require_clean_start: Option<bool>,
    pub additional_inputs: Option<Vec<String>>,
}

impl StartRequest {
    pub fn inline(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(PromptSource::inline(prompt)),
            ..Default::default()
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            prompt: Some(PromptSource::file(path)),
            ..Default::default()
        }
    }
}

pub struct LoopManager<W: WorkUnit, E: Environment> {
    workdir: PathBuf,
    orchestrator: Orchestrator<W, E>,
    defaults: LoopConfig,
}

impl<W: WorkUnit, E: Environment> LoopManager<W, E> {
    pub fn new(workdir: impl Into<PathBuf>, orchestrator: Orchestrator<W, E>, defaults: LoopConfig) -> Self {
        Self {
            workdir: workdir.into(),
            orchestrator,
            defaults,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn storage(&self) -> &LoopStorage {
        self.orchestrator.storage()
    }

    fn load_required(&self) -> Result<LoopState> {
        self.storage()
            .state
            .load()?
            .ok_or_else(|| RalphError::Configuration("no loop initialized".into()))
    }

    /// Resolve a request against the configured defaults
    pub fn settings_for(&self, request: StartRequest) -> Result<LoopSettings> {
        let d = &self.defaults;
        let prompt = request
            .prompt
            .ok_or_else(|| RalphError::Configuration("a prompt or prompt file is required".into()))?;

        let additional_inputs = match request.additional_inputs {
            Some(inputs) => inputs,
            None => d
                .default_additional_inputs
                .iter()
                .filter(|name| self.workdir.join(name).is_file())
                .cloned()
                .collect(),
        };

        Ok(LoopSettings {
            prompt: prompt.with_inputs(additional_inputs),
            completion_token: request
                .completion_token
                .unwrap_or_else(|| d.default_completion_token.clone()),
            max_iterations: request.max_iterations.unwrap_or(d.default_max_iterations),
            max_runtime_minutes: request.max_runtime_minutes.unwrap_or(d.default_max_runtime_minutes),
            safety: SafetyLimits {
                no_change_limit: request.no_change_limit.unwrap_or(d.default_no_change_limit),
                repeat_error_limit: request.repeat_error_limit.unwrap_or(d.default_repeat_error_limit),
                require_clean_start: request.require_clean_start.unwrap_or(d.default_require_clean_start),
            },
        })
    }

    /// Write a fresh loop state and run it.
    ///
    /// History is kept across loops; the carryover context is reset.
    pub async fn start(&self, request: StartRequest) -> Result<StopReason> {
        let settings = self.settings_for(request)?;
        let state = LoopState::new(settings)?;

        if let Some(existing) = self.storage().state.load()?
            && existing.active
        {
            return Err(RalphError::InvalidState(format!(
                "loop is already active at iteration {}",
                existing.iteration
            )));
        }

        self.storage().state.save(&state)?;
        self.storage().context.write("")?;
        info!(
            "Loop started: max {} iterations, {} minutes",
            state.max_iterations, state.max_runtime_minutes
        );

        self.orchestrator.run().await
    }

    /// Request a stop; a running loop sees it at its next kill-switch poll
    pub fn stop(&self) -> Result<LoopState> {
        self.deactivate(StopReason::UserStop)
    }

    pub fn pause(&self) -> Result<LoopState> {
        self.deactivate(StopReason::UserPaused)
    }

    fn deactivate(&self, reason: StopReason) -> Result<LoopState> {
        let mut state = self.load_required()?;
        state.stop(reason);
        self.storage().state.save(&state)?;
        info!("Loop deactivated: {}", reason);
        Ok(state)
    }

    /// Reactivate an inactive loop, keeping its counters, and run it
    pub async fn resume(&self) -> Result<StopReason> {
        let mut state = self.load_required()?;
        if state.active {
            warn!("Resume requested but loop is already active");
            return Err(RalphError::InvalidState("loop is already active".into()));
        }

        let previous = state.stop_reason;
        state.reactivate();
        self.storage().state.save(&state)?;
        info!(
            "Loop resumed at iteration {} (was {})",
            state.iteration,
            previous.map(|r| r.as_str()).unwrap_or("inactive")
        );

        self.orchestrator.run().await
    }

    /// Run the stored loop as-is, e.g. after a crash
    pub async fn run(&self) -> Result<StopReason> {
        self.orchestrator.run().await
    }

    pub fn status(&self) -> Result<LoopState> {
        self.load_required()
    }

    /// The `n` most recent history entries, oldest first
    pub fn log(&self, n: usize) -> Result<Vec<HistoryEntry>> {
        self.storage().history.read_last(n)
    }

    /// Stored state as pretty JSON
    pub fn show_config(&self) -> Result<String> {
        let state = self.load_required()?;
        Ok(serde_json::to_string_pretty(&state)?)
    }

    pub fn context(&self) -> Result<String> {
        self.storage().context.read()
    }
}
