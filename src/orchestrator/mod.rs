//! Orchestrator loop - drives iterations until a stop condition holds.
//!
//! The loop owns one `LoopState` value for the duration of a run and writes
//! it at fixed checkpoints:
//! - after the iteration counter is bumped, before the work unit runs
//! - after the post-check, whether or not the loop continues
//! - on every stop
//!
//! Another process stops the loop by flipping `active` in the state file.
//! The file is re-read before each iteration and again right before the
//! post-iteration save, so an external stop is never overwritten.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::domain::{HistoryEntry, IterationOutcome, LoopState, StopReason};
use crate::environment::Environment;
use crate::error::{RalphError, Result};
use crate::id::now;
use crate::policy;
use crate::prompt::{DEFAULT_NOTES_MAX_CHARS, build_carryover, truncate_chars};
use crate::runner::IterationRunner;
use crate::storage::LoopStorage;
use crate::work_unit::WorkUnit;

/// Default pause between iterations
pub const DEFAULT_ITERATION_DELAY_MS: u64 = 1000;

/// Default bound on notes recorded in history
pub const DEFAULT_HISTORY_NOTES_MAX_CHARS: usize = 200;

/// Tunables for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Pacing delay after each non-terminal iteration
    pub iteration_delay: Duration,
    /// Bound on notes embedded in the carryover context
    pub notes_max_chars: usize,
    /// Bound on notes recorded in history
    pub history_notes_max_chars: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            iteration_delay: Duration::from_millis(DEFAULT_ITERATION_DELAY_MS),
            notes_max_chars: DEFAULT_NOTES_MAX_CHARS,
            history_notes_max_chars: DEFAULT_HISTORY_NOTES_MAX_CHARS,
        }
    }
}

/// Drives the loop stored under one state directory
pub struct Orchestrator<W: WorkUnit, E: Environment> {
    storage: LoopStorage,
    runner: IterationRunner<W>,
    environment: Arc<E>,
    options: OrchestratorOptions,
}

impl<W: WorkUnit, E: Environment> Orchestrator<W, E> {
    pub fn new(storage: LoopStorage, runner: IterationRunner<W>, environment: Arc<E>) -> Self {
        Self {
            storage,
            runner,
            environment,
            options: OrchestratorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn storage(&self) -> &LoopStorage {
        &self.storage
    }

    /// Run the stored loop until it stops.
    ///
    /// A policy or user stop is `Ok(reason)`. Errors mean the loop could not
    /// run or could not persist its state.
    pub async fn run(&self) -> Result<StopReason> {
        let Some(mut state) = self.storage.state.load()? else {
            return Err(RalphError::Configuration("no loop initialized".into()));
        };

        if !state.active {
            let reason = state
                .stop_reason
                .ok_or_else(|| RalphError::InvalidState("inactive loop has no stop reason".into()))?;
            info!("Loop is not active ({}), nothing to run", reason);
            return Ok(reason);
        }

        if let Some(reason) = state.stop_reason {
            return Err(RalphError::InvalidState(format!(
                "active loop carries stop reason {}",
                reason
            )));
        }

        info!(
            "Running loop from iteration {} (max {})",
            state.iteration, state.max_iterations
        );

        if state.safety.require_clean_start && state.iteration == 0 {
            match self.environment.check_clean() {
                Ok(check) if !check.clean => {
                    warn!("Working tree is dirty: {}", check.changes.join(", "));
                    return self.halt(&mut state, StopReason::DirtyStart);
                }
                Ok(_) => debug!("Working tree is clean"),
                Err(e) => warn!("Clean-start check failed, continuing: {}", e),
            }
        }

        loop {
            if let Some(reason) = self.poll_kill_switch()? {
                return self.halt(&mut state, reason);
            }

            if let Some(reason) = policy::evaluate(&state, None, now()).stop {
                return self.halt(&mut state, reason);
            }

            state.iteration += 1;
            let started = now();
            state.last_iteration_at = started;
            self.storage.state.save(&state)?;
            info!("Iteration {} started", state.iteration);

            let carryover = self.storage.context.read()?;
            let outcome = self.runner.run(&state, &carryover).await;
            let ended = now();
            state.last_session_id = outcome.session_id.clone();

            let mut entry = HistoryEntry::from_outcome(state.iteration, started, ended, &outcome);
            entry.notes = truncate_chars(&entry.notes, self.options.history_notes_max_chars).to_string();
            self.storage.history.append(&entry)?;

            let context = build_carryover(&outcome, &carryover, self.options.notes_max_chars);
            self.storage.context.write(&context.render())?;

            let evaluation = policy::evaluate(&state, Some(&outcome), ended);
            evaluation.counters.apply_to(&mut state);
            state.last_summary = summarize(state.iteration, &outcome);

            let stop = evaluation
                .stop
                .or_else(|| (!outcome.success).then_some(StopReason::IterationError));
            if let Some(reason) = stop {
                return self.halt(&mut state, reason);
            }

            if let Some(reason) = self.checkpoint(&state)? {
                return self.halt(&mut state, reason);
            }

            if let Err(e) = self.environment.after_iteration(state.iteration) {
                warn!("Post-iteration side effect failed: {}", e);
            }

            if !self.options.iteration_delay.is_zero() {
                tokio::time::sleep(self.options.iteration_delay).await;
            }
        }
    }

    /// Re-read the state file and report an external stop.
    ///
    /// The file's own reason wins when it has one, so a pause stays a pause.
    /// A missing file counts as a kill switch.
    pub fn poll_kill_switch(&self) -> Result<Option<StopReason>> {
        match self.storage.state.load()? {
            Some(disk) if disk.active => Ok(None),
            Some(disk) => Ok(Some(disk.stop_reason.unwrap_or(StopReason::KillSwitch))),
            None => {
                warn!("State file disappeared during run");
                Ok(Some(StopReason::KillSwitch))
            }
        }
    }

    /// Persist a continuing state unless another process stopped the loop.
    fn checkpoint(&self, state: &LoopState) -> Result<Option<StopReason>> {
        if let Some(reason) = self.poll_kill_switch()? {
            return Ok(Some(reason));
        }
        self.storage.state.save(state)?;
        Ok(None)
    }

    fn halt(&self, state: &mut LoopState, reason: StopReason) -> Result<StopReason> {
        state.stop(reason);
        self.storage.state.save(state)?;
        info!(
            "Loop stopped after {} iterations: {} ({})",
            state.iteration,
            reason,
            reason.describe()
        );
        Ok(reason)
    }
}

fn summarize(iteration: u32, outcome: &IterationOutcome) -> String {
    if outcome.success {
        format!(
            "Iteration {}: {}, {} changed",
            iteration,
            outcome.result_tag(),
            outcome.changed_resources.len()
        )
    } else {
        format!("Iteration {}: error: {}", iteration, truncate_chars(&outcome.notes, 80))
    }
}
