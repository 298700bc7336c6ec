//! Carryover context persistence.

use std::path::{Path, PathBuf};

use super::atomic::{read_optional, write_atomic};
use crate::error::Result;

/// File name of the carryover document inside the state directory.
pub const CONTEXT_FILE: &str = "context.md";

/// Holds the most recent carryover text; each write fully replaces it.
#[derive(Debug, Clone)]
pub struct ContextStore {
    path: PathBuf,
}

impl ContextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current carryover text; empty when none was written yet.
    pub fn read(&self) -> Result<String> {
        Ok(read_optional(&self.path)?.unwrap_or_default())
    }

    pub fn write(&self, text: &str) -> Result<()> {
        write_atomic(&self.path, text.as_bytes())
    }
}
