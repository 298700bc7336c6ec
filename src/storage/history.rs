//! Append-only iteration history.

use std::path::{Path, PathBuf};

use super::atomic::{read_optional, write_atomic};
use crate::domain::HistoryEntry;
use crate::error::{RalphError, Result};

/// File name of the history log inside the state directory.
pub const HISTORY_FILE: &str = "history.json";

/// Durable, append-only list of `HistoryEntry` records.
///
/// Every append rewrites the whole file through the atomic replace path, so
/// the log is never observed half-written.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry, oldest first. A missing log is empty.
    pub fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        let Some(content) = read_optional(&self.path)? else {
            return Ok(Vec::new());
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| RalphError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    /// Append one entry.
    pub fn append(&self, entry: &HistoryEntry) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.push(entry.clone());
        let json = serde_json::to_string_pretty(&entries)?;
        write_atomic(&self.path, json.as_bytes())
    }

    /// The `n` most recent entries in chronological order.
    pub fn read_last(&self, n: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.read_all()?;
        let skip = entries.len().saturating_sub(n);
        Ok(entries.split_off(skip))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_all()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
