//! Loop state record and related types
//!
//! `LoopState` is the single durable record describing one loop instance in a
//! working directory: its configuration, its progress, and why it stopped.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RalphError, Result};
use crate::id::now;

/// Current on-disk schema version for `LoopState`
pub const SCHEMA_VERSION: u32 = 1;

/// The durable state of a loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    pub schema_version: u32,

    //=== Control ===
    /// The kill-switch flag; the loop only runs while this is true
    pub active: bool,

    /// Set when the loop transitions to inactive
    pub stop_reason: Option<StopReason>,

    //=== Limits ===
    pub iteration: u32,
    pub max_iterations: u32,
    pub max_runtime_minutes: u64,
    pub safety: SafetyLimits,

    //=== Task ===
    /// How each iteration's prompt is built
    pub prompt: PromptSource,

    /// Substring whose presence in work-unit output means the task is done
    pub completion_token: String,

    //=== Timestamps ===
    pub started_at: DateTime<Utc>,
    pub last_iteration_at: DateTime<Utc>,

    //=== Policy counters ===
    pub no_progress_count: u32,
    pub consecutive_error_count: u32,
    pub last_error_fingerprint: Option<String>,

    //=== Diagnostics ===
    pub last_session_id: Option<String>,

    /// One-line summary of the latest iteration
    #[serde(default)]
    pub last_summary: String,
}

/// Where the base prompt comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// `value` is the prompt text itself
    Inline,
    /// `value` is a path, relative to the working directory
    File,
}

/// How to construct each iteration's task prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSource {
    pub mode: PromptMode,
    pub value: String,

    /// Extra files (or glob patterns) injected ahead of the prompt, in order
    #[serde(default)]
    pub additional_inputs: Vec<String>,
}

impl PromptSource {
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            mode: PromptMode::Inline,
            value: text.into(),
            additional_inputs: vec![],
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            mode: PromptMode::File,
            value: path.into(),
            additional_inputs: vec![],
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<String>) -> Self {
        self.additional_inputs = inputs;
        self
    }
}

/// Safety stop limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Consecutive successful iterations with no detected change before stopping
    pub no_change_limit: u32,
    /// Consecutive identical failures before stopping
    pub repeat_error_limit: u32,
    /// Refuse the first iteration when the working tree is dirty
    pub require_clean_start: bool,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            no_change_limit: 3,
            repeat_error_limit: 3,
            require_clean_start: true,
        }
    }
}

/// Why a loop transitioned to inactive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Work unit emitted the completion token
    CompletionPromise,
    MaxIterations,
    MaxRuntime,
    /// Same error fingerprint hit the repeat limit
    RepeatedError,
    /// Permission/access failure seen on consecutive attempts
    PermissionBlocked,
    /// Too many successful iterations without detected changes
    NoProgress,
    /// Working tree was dirty before the first iteration
    DirtyStart,
    /// State file flipped to inactive by another process
    KillSwitch,
    /// The iteration itself failed
    IterationError,
    UserStop,
    /// User-initiated pause (resumable)
    UserPaused,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::CompletionPromise => "completion_promise",
            StopReason::MaxIterations => "max_iterations",
            StopReason::MaxRuntime => "max_runtime",
            StopReason::RepeatedError => "repeated_error",
            StopReason::PermissionBlocked => "permission_blocked",
            StopReason::NoProgress => "no_progress",
            StopReason::DirtyStart => "dirty_start",
            StopReason::KillSwitch => "kill_switch",
            StopReason::IterationError => "iteration_error",
            StopReason::UserStop => "user_stop",
            StopReason::UserPaused => "user_paused",
        }
    }

    /// Human-readable explanation for status output
    pub fn describe(&self) -> &'static str {
        match self {
            StopReason::CompletionPromise => "completion token found in work unit output",
            StopReason::MaxIterations => "iteration limit reached",
            StopReason::MaxRuntime => "runtime limit reached",
            StopReason::RepeatedError => "the same error repeated too many times",
            StopReason::PermissionBlocked => "work unit is blocked on permissions",
            StopReason::NoProgress => "no changes detected for too many iterations",
            StopReason::DirtyStart => "working tree had uncommitted changes at start",
            StopReason::KillSwitch => "state was deactivated externally",
            StopReason::IterationError => "iteration failed",
            StopReason::UserStop => "stopped by user",
            StopReason::UserPaused => "paused by user",
        }
    }

    /// Returns true if the stop was requested by a user rather than policy
    pub fn is_user_initiated(&self) -> bool {
        matches!(self, StopReason::UserStop | StopReason::UserPaused)
    }

    /// Returns true if the loop was paused rather than stopped
    pub fn is_pause(&self) -> bool {
        matches!(self, StopReason::UserPaused)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs for a fresh loop
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub prompt: PromptSource,
    pub completion_token: String,
    pub max_iterations: u32,
    pub max_runtime_minutes: u64,
    pub safety: SafetyLimits,
}

impl LoopSettings {
    /// Reject settings that could never run a loop.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(RalphError::Configuration("max_iterations must be > 0".into()));
        }
        if self.max_runtime_minutes == 0 {
            return Err(RalphError::Configuration("max_runtime_minutes must be > 0".into()));
        }
        if self.safety.no_change_limit == 0 {
            return Err(RalphError::Configuration("no_change_limit must be > 0".into()));
        }
        if self.safety.repeat_error_limit == 0 {
            return Err(RalphError::Configuration("repeat_error_limit must be > 0".into()));
        }
        if self.completion_token.trim().is_empty() {
            return Err(RalphError::Configuration("completion token must not be empty".into()));
        }
        if self.prompt.value.trim().is_empty() {
            return Err(RalphError::Configuration("prompt must not be empty".into()));
        }
        Ok(())
    }
}

impl LoopState {
    /// Create a fresh, active loop from validated settings
    pub fn new(settings: LoopSettings) -> Result<Self> {
        settings.validate()?;
        let started = now();

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            active: true,
            stop_reason: None,
            iteration: 0,
            max_iterations: settings.max_iterations,
            max_runtime_minutes: settings.max_runtime_minutes,
            safety: settings.safety,
            prompt: settings.prompt,
            completion_token: settings.completion_token,
            started_at: started,
            last_iteration_at: started,
            no_progress_count: 0,
            consecutive_error_count: 0,
            last_error_fingerprint: None,
            last_session_id: None,
            last_summary: "Loop initialized".to_string(),
        })
    }

    /// Transition to inactive with the given reason
    pub fn stop(&mut self, reason: StopReason) {
        self.active = false;
        self.stop_reason = Some(reason);
    }

    /// Transition back to active; counters are kept
    pub fn reactivate(&mut self) {
        self.active = true;
        self.stop_reason = None;
    }

    /// Minutes elapsed since the loop started
    pub fn runtime_minutes(&self, at: DateTime<Utc>) -> f64 {
        let elapsed = at.signed_duration_since(self.started_at);
        elapsed.num_milliseconds() as f64 / 60_000.0
    }

    /// Returns true if the loop is inactive because of a user pause
    pub fn is_paused(&self) -> bool {
        !self.active && self.stop_reason.is_some_and(|r| r.is_pause())
    }
}
