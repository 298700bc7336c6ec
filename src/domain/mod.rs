//! Domain types for Ralph
//!
//! This module contains all core domain types:
//! - LoopState: the durable loop record (config, progress, stop reason)
//! - HistoryEntry: per-iteration audit records
//! - IterationOutcome: the structured result of one iteration

pub mod history;
pub mod loop_state;
pub mod outcome;

pub use history::{HistoryEntry, IterationResult};
pub use loop_state::{LoopSettings, LoopState, PromptMode, PromptSource, SafetyLimits, StopReason};
pub use outcome::IterationOutcome;
