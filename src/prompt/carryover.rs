//! Carryover context - the compact summary one iteration leaves for the next.
//!
//! Each iteration starts with a fresh agent session, so whatever the next
//! iteration should know about the last one has to be written down. The
//! document has five fixed sections and is fully replaced every iteration.

use std::fmt;

use crate::domain::IterationOutcome;

/// Default bound on free-text notes embedded in the carryover.
pub const DEFAULT_NOTES_MAX_CHARS: usize = 100;

/// The five-section carryover document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CarryoverContext {
    pub current_state: Vec<String>,
    pub last_change: Vec<String>,
    pub last_result: Vec<String>,
    pub next_step: Vec<String>,
    pub blockers: Vec<String>,
}

impl CarryoverContext {
    /// Render as plain structured text
    pub fn render(&self) -> String {
        let sections = [
            ("CURRENT_STATE", &self.current_state),
            ("LAST_CHANGE", &self.last_change),
            ("LAST_RESULT", &self.last_result),
            ("NEXT_STEP", &self.next_step),
            ("BLOCKERS", &self.blockers),
        ];

        sections
            .iter()
            .map(|(heading, lines)| {
                let mut block = format!("{}:", heading);
                for line in lines.iter() {
                    block.push_str("\n- ");
                    block.push_str(line);
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl fmt::Display for CarryoverContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Build the carryover for the iteration that just finished.
///
/// `_previous` is the prior carryover text; the current summary does not
/// need it.
pub fn build_carryover(outcome: &IterationOutcome, _previous: &str, notes_max_chars: usize) -> CarryoverContext {
    let notes = truncate_chars(&outcome.notes, notes_max_chars);
    let changed = outcome.changed_resources.join(", ");

    let current_state = if outcome.completion_found {
        vec!["Completion token found, loop will stop".to_string()]
    } else if outcome.success {
        let detail = if outcome.made_progress() {
            format!("Changed files: {}", changed)
        } else {
            "No files changed this iteration".to_string()
        };
        vec!["Iteration completed successfully".to_string(), detail]
    } else {
        vec!["Iteration failed with error".to_string()]
    };

    let last_change = if outcome.made_progress() {
        vec![format!("Files changed: {}", changed)]
    } else if !outcome.success {
        vec![format!("Error: {}", notes)]
    } else {
        vec!["No changes made".to_string()]
    };

    let last_result = if outcome.success {
        vec!["Iteration completed without errors".to_string()]
    } else {
        vec![format!("FAILED: {}", notes)]
    };

    let next_step = if outcome.completion_found {
        vec!["Loop complete, no further action needed".to_string()]
    } else {
        vec!["Continue with next iteration".to_string()]
    };

    let blockers = match (&outcome.error_fingerprint, outcome.success) {
        (Some(fp), false) => vec![format!("Error fingerprint: {}", fp)],
        _ => vec!["None".to_string()],
    };

    CarryoverContext {
        current_state,
        last_change,
        last_result,
        next_step,
        blockers,
    }
}
