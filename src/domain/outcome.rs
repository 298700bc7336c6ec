//! Iteration outcome types.
//!
//! The structured result the iteration runner hands back to the loop. A
//! failed work unit is still an outcome, never an error.

use super::history::IterationResult;

/// Outcome of a single iteration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IterationOutcome {
    /// The work unit was invoked and its output parsed
    pub success: bool,

    /// The completion token appeared in the output
    pub completion_found: bool,

    /// Heuristically detected changed resources, first-seen order
    pub changed_resources: Vec<String>,

    /// Short free text: output prefix or failure message
    pub notes: String,

    /// Stable hash of the failure message
    pub error_fingerprint: Option<String>,

    pub test_results: Option<String>,
    pub lint_results: Option<String>,

    /// Session id of the invocation, when one was started
    pub session_id: Option<String>,
}

impl IterationOutcome {
    /// A successful iteration
    pub fn success(notes: impl Into<String>, changed_resources: Vec<String>, completion_found: bool) -> Self {
        Self {
            success: true,
            completion_found,
            changed_resources,
            notes: notes.into(),
            ..Default::default()
        }
    }

    /// A failed iteration carrying the fingerprint of its message
    pub fn failure(message: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            success: false,
            notes: message.into(),
            error_fingerprint: Some(fingerprint.into()),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// History tag for this outcome
    pub fn result_tag(&self) -> IterationResult {
        if self.completion_found {
            IterationResult::Done
        } else if self.success {
            IterationResult::Continue
        } else {
            IterationResult::Error
        }
    }

    /// Returns true if the iteration produced any detected change
    pub fn made_progress(&self) -> bool {
        !self.changed_resources.is_empty()
    }
}
