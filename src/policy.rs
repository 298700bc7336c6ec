//! Stop-condition evaluation.
//!
//! `evaluate` is a pure decision over the current state and the latest
//! outcome. It returns the updated policy counters alongside the decision;
//! the caller applies them to its own state value.
//!
//! Rules, first match wins:
//! 1. completion_promise
//! 2. max_iterations
//! 3. max_runtime
//! 4. repeated_error
//! 5. permission_blocked
//! 6. no_progress

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::domain::{IterationOutcome, LoopState, StopReason};

/// Consecutive identical failures after which a permission problem stops the loop.
pub const PERMISSION_BLOCKED_THRESHOLD: u32 = 2;

static PERMISSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:permission|access)\s*(?:denied|blocked|refused)").expect("permission pattern is valid")
});

/// The counters the policy maintains across iterations
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PolicyCounters {
    pub no_progress_count: u32,
    pub consecutive_error_count: u32,
    pub last_error_fingerprint: Option<String>,
}

impl PolicyCounters {
    pub fn from_state(state: &LoopState) -> Self {
        Self {
            no_progress_count: state.no_progress_count,
            consecutive_error_count: state.consecutive_error_count,
            last_error_fingerprint: state.last_error_fingerprint.clone(),
        }
    }

    pub fn apply_to(self, state: &mut LoopState) {
        state.no_progress_count = self.no_progress_count;
        state.consecutive_error_count = self.consecutive_error_count;
        state.last_error_fingerprint = self.last_error_fingerprint;
    }
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub counters: PolicyCounters,
    pub stop: Option<StopReason>,
}

impl Evaluation {
    fn new(counters: PolicyCounters, stop: Option<StopReason>) -> Self {
        Self { counters, stop }
    }
}

/// Returns true if failure notes indicate a permission or explicit block.
pub fn is_permission_blocked(notes: &str) -> bool {
    PERMISSION_PATTERN.is_match(notes) || notes.contains("BLOCKED")
}

/// Evaluate the stop conditions.
///
/// `outcome` is `None` for the pre-check, before an iteration has run: only
/// the iteration and runtime limits apply and the counters are unchanged.
pub fn evaluate(state: &LoopState, outcome: Option<&IterationOutcome>, now: DateTime<Utc>) -> Evaluation {
    let mut counters = PolicyCounters::from_state(state);

    if outcome.is_some_and(|o| o.completion_found) {
        return Evaluation::new(counters, Some(StopReason::CompletionPromise));
    }

    if state.iteration >= state.max_iterations {
        return Evaluation::new(counters, Some(StopReason::MaxIterations));
    }

    if state.runtime_minutes(now) >= state.max_runtime_minutes as f64 {
        return Evaluation::new(counters, Some(StopReason::MaxRuntime));
    }

    let Some(outcome) = outcome else {
        return Evaluation::new(counters, None);
    };

    if let Some(fingerprint) = &outcome.error_fingerprint {
        if counters.last_error_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            counters.consecutive_error_count += 1;
        } else {
            counters.consecutive_error_count = 1;
            counters.last_error_fingerprint = Some(fingerprint.clone());
        }

        if counters.consecutive_error_count >= state.safety.repeat_error_limit {
            return Evaluation::new(counters, Some(StopReason::RepeatedError));
        }

        if is_permission_blocked(&outcome.notes) && counters.consecutive_error_count >= PERMISSION_BLOCKED_THRESHOLD {
            return Evaluation::new(counters, Some(StopReason::PermissionBlocked));
        }
    } else if outcome.success {
        counters.consecutive_error_count = 0;
        counters.last_error_fingerprint = None;
    }

    if outcome.success && !outcome.made_progress() {
        counters.no_progress_count += 1;
        if counters.no_progress_count >= state.safety.no_change_limit {
            return Evaluation::new(counters, Some(StopReason::NoProgress));
        }
    } else if outcome.made_progress() {
        counters.no_progress_count = 0;
    }

    Evaluation::new(counters, None)
}
