//! Environment boundary: the working tree around the loop.
//!
//! The loop asks whether the tree is clean before the first iteration and
//! hands it post-iteration side effects. Both are best-effort from the
//! loop's point of view.

mod git;

pub use git::{GitEnvironment, GitOptions};

use crate::error::Result;

/// Result of a cleanliness check
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CleanCheck {
    pub clean: bool,
    /// Uncommitted paths, as reported by the environment
    pub changes: Vec<String>,
}

impl CleanCheck {
    pub fn clean() -> Self {
        Self {
            clean: true,
            changes: Vec::new(),
        }
    }

    pub fn dirty(changes: Vec<String>) -> Self {
        Self { clean: false, changes }
    }
}

pub trait Environment: Send + Sync {
    /// Is the working tree free of uncommitted changes?
    fn check_clean(&self) -> Result<CleanCheck>;

    /// Side effects after a completed, non-terminal iteration
    fn after_iteration(&self, iteration: u32) -> Result<()>;
}

/// Environment with no working tree: always clean, no side effects
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnvironment;

impl Environment for NoopEnvironment {
    fn check_clean(&self) -> Result<CleanCheck> {
        Ok(CleanCheck::clean())
    }

    fn after_iteration(&self, _iteration: u32) -> Result<()> {
        Ok(())
    }
}
