//! Storage layer for Ralph - crash-safe JSON and text files.
//!
//! Three independent durable resources live under one state directory:
//! - `state.json`: the `LoopState` record
//! - `history.json`: the append-only iteration history
//! - `context.md`: the latest carryover context
//!
//! Every write goes through `atomic::write_atomic`.

pub mod atomic;
mod context;
mod history;
mod state;

use std::path::{Path, PathBuf};

pub use context::{CONTEXT_FILE, ContextStore};
pub use history::{HISTORY_FILE, HistoryLog};
pub use state::{STATE_FILE, StateStore};

/// Default state directory, relative to the working directory.
pub const DEFAULT_STATE_DIR: &str = ".ralph";

/// The three stores of one working directory.
#[derive(Debug, Clone)]
pub struct LoopStorage {
    dir: PathBuf,
    pub state: StateStore,
    pub history: HistoryLog,
    pub context: ContextStore,
}

impl LoopStorage {
    /// Open the stores under `dir`. Nothing is created until the first write.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        Self {
            state: StateStore::new(dir.join(STATE_FILE)),
            history: HistoryLog::new(dir.join(HISTORY_FILE)),
            context: ContextStore::new(dir.join(CONTEXT_FILE)),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
