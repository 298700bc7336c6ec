//! Loop Manager module
//!
//! The user-facing command surface: start, stop, pause, resume, run and the
//! read-only status queries.

mod loop_manager;

pub use loop_manager::{DEFAULT_LOG_ENTRIES, LoopManager, StartRequest};
