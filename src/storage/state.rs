//! Loop state persistence.

use std::path::{Path, PathBuf};

use log::debug;

use super::atomic::{read_optional, write_atomic};
use crate::domain::LoopState;
use crate::error::{RalphError, Result};

/// File name of the state record inside the state directory.
pub const STATE_FILE: &str = "state.json";

/// Durable store for the single `LoopState` of a working directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a state file has been written.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the stored state.
    ///
    /// `Ok(None)` means no loop was ever started here; a file that exists but
    /// does not parse is `RalphError::Corrupt`.
    pub fn load(&self) -> Result<Option<LoopState>> {
        let Some(content) = read_optional(&self.path)? else {
            return Ok(None);
        };

        let state = serde_json::from_str(&content).map_err(|e| RalphError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        Ok(Some(state))
    }

    /// Atomically persist the state.
    pub fn save(&self, state: &LoopState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        write_atomic(&self.path, json.as_bytes())?;
        debug!(
            "Saved state: iteration={} active={} stop_reason={:?}",
            state.iteration, state.active, state.stop_reason
        );
        Ok(())
    }
}
