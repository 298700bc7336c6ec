//! History entries - the per-iteration audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::outcome::IterationOutcome;

/// Result tag recorded for one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationResult {
    Continue,
    Done,
    Stopped,
    Error,
}

impl IterationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            IterationResult::Continue => "continue",
            IterationResult::Done => "done",
            IterationResult::Stopped => "stopped",
            IterationResult::Error => "error",
        }
    }
}

impl std::fmt::Display for IterationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One appended history record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub iteration: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub result: IterationResult,

    /// Resources the iteration reported changing
    #[serde(default)]
    pub changed_resources: Vec<String>,

    pub error_fingerprint: Option<String>,
    pub notes: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_results: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lint_results: Option<String>,
}

impl HistoryEntry {
    /// Build the entry for a finished iteration
    pub fn from_outcome(
        iteration: u32,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        outcome: &IterationOutcome,
    ) -> Self {
        Self {
            iteration,
            started_at,
            ended_at,
            result: outcome.result_tag(),
            changed_resources: outcome.changed_resources.clone(),
            error_fingerprint: outcome.error_fingerprint.clone(),
            notes: outcome.notes.clone(),
            test_results: outcome.test_results.clone(),
            lint_results: outcome.lint_results.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::now;

    #[test]
    fn test_result_serialization() {
        assert_eq!(serde_json::to_string(&IterationResult::Continue).unwrap(), "\"continue\"");
        assert_eq!(serde_json::to_string(&IterationResult::Done).unwrap(), "\"done\"");
        assert_eq!(serde_json::to_string(&IterationResult::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_from_outcome_success() {
        let outcome = IterationOutcome::success("updated src/lib.rs", vec!["src/lib.rs".into()], false);
        let t = now();
        let entry = HistoryEntry::from_outcome(4, t, t, &outcome);

        assert_eq!(entry.iteration, 4);
        assert_eq!(entry.result, IterationResult::Continue);
        assert_eq!(entry.changed_resources, vec!["src/lib.rs".to_string()]);
        assert_eq!(entry.error_fingerprint, None);
    }

    #[test]
    fn test_from_outcome_failure() {
        let outcome = IterationOutcome::failure("connection refused", "0011223344556677");
        let t = now();
        let entry = HistoryEntry::from_outcome(1, t, t, &outcome);

        assert_eq!(entry.result, IterationResult::Error);
        assert_eq!(entry.error_fingerprint.as_deref(), Some("0011223344556677"));
        assert_eq!(entry.notes, "connection refused");
    }

    #[test]
    fn test_optional_results_skipped_when_absent() {
        let outcome = IterationOutcome::success("ok", vec![], false);
        let t = now();
        let json = serde_json::to_string(&HistoryEntry::from_outcome(1, t, t, &outcome)).unwrap();
        assert!(!json.contains("test_results"));
        assert!(!json.contains("lint_results"));
    }
}
