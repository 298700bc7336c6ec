//! Prompt construction: per-iteration prompt assembly and the carryover
//! context that links one iteration to the next.

pub mod builder;
pub mod carryover;

pub use builder::{DEFAULT_PLAN_FILE, PromptBuilder};
pub use carryover::{CarryoverContext, DEFAULT_NOTES_MAX_CHARS, build_carryover, truncate_chars};
