//! Iteration runner - one fresh work-unit session per call.
//!
//! The runner assembles the prompt, invokes the work unit and parses its
//! output. It never fails: anything that goes wrong becomes a failed
//! `IterationOutcome` carrying the fingerprint of its message.

use std::sync::Arc;

use log::{debug, info, warn};

use super::fingerprint::fingerprint;
use super::parse::{
    contains_completion, extract_changed_resources, extract_lint_results, extract_test_results, output_notes,
};
use crate::domain::{IterationOutcome, LoopState};
use crate::prompt::PromptBuilder;
use crate::work_unit::WorkUnit;

/// Runs single iterations against a work unit
pub struct IterationRunner<W: WorkUnit> {
    work_unit: Arc<W>,
    prompt_builder: PromptBuilder,
}

impl<W: WorkUnit> IterationRunner<W> {
    pub fn new(work_unit: Arc<W>, prompt_builder: PromptBuilder) -> Self {
        Self {
            work_unit,
            prompt_builder,
        }
    }

    /// Run one iteration for `state`, with `carryover` from the previous one.
    pub async fn run(&self, state: &LoopState, carryover: &str) -> IterationOutcome {
        let prompt = match self.prompt_builder.build(state, carryover) {
            Ok(prompt) => prompt,
            Err(e) => return self.failed(e.to_string()),
        };

        debug!("Iteration {}: invoking work unit", state.iteration);
        let response = match self.work_unit.invoke(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                let session_id = e.session_id().map(str::to_string);
                return self.failed(e.to_string()).with_session(session_id);
            }
        };

        let output = response.output;
        let completion_found = contains_completion(&output, &state.completion_token);
        let changed = extract_changed_resources(&output);
        let notes = output_notes(&output, completion_found, &state.completion_token);

        info!(
            "Iteration {} completed: {} changed, completion={}",
            state.iteration,
            changed.len(),
            completion_found
        );

        let mut outcome = IterationOutcome::success(notes, changed, completion_found).with_session(response.session_id);
        outcome.test_results = extract_test_results(&output);
        outcome.lint_results = extract_lint_results(&output);
        outcome
    }

    fn failed(&self, message: String) -> IterationOutcome {
        warn!("Iteration failed: {}", message);
        let fp = fingerprint(&message);
        IterationOutcome::failure(message, fp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LoopSettings, PromptSource, SafetyLimits};
    use crate::work_unit::ScriptedWorkUnit;
    use tempfile::TempDir;

    fn state(prompt: PromptSource) -> LoopState {
        LoopState::new(LoopSettings {
            prompt,
            completion_token: "<promise>DONE</promise>".into(),
            max_iterations: 10,
            max_runtime_minutes: 60,
            safety: SafetyLimits::default(),
        })
        .unwrap()
    }

    fn runner(temp: &TempDir, unit: ScriptedWorkUnit) -> (IterationRunner<ScriptedWorkUnit>, Arc<ScriptedWorkUnit>) {
        let unit = Arc::new(unit);
        (IterationRunner::new(Arc::clone(&unit), PromptBuilder::new(temp.path())), unit)
    }

    #[tokio::test]
    async fn test_success_parses_output() {
        let temp = TempDir::new().unwrap();
        let (runner, unit) = runner(
            &temp,
            ScriptedWorkUnit::new().respond("I modified src/lib.rs\nTests: 4 passed\ncargo clippy: pass"),
        );

        let outcome = runner.run(&state(PromptSource::inline("Build it")), "CURRENT_STATE:\n- x").await;

        assert!(outcome.success);
        assert!(!outcome.completion_found);
        assert_eq!(outcome.changed_resources, vec!["src/lib.rs"]);
        assert_eq!(outcome.test_results.as_deref(), Some("Tests: 4 passed"));
        assert_eq!(outcome.lint_results.as_deref(), Some("cargo clippy: pass"));
        assert_eq!(outcome.session_id.as_deref(), Some("scripted-1"));
        assert!(outcome.error_fingerprint.is_none());

        let prompt = &unit.prompts()[0];
        assert!(prompt.starts_with("Previous context:\nCURRENT_STATE:"));
        assert!(prompt.ends_with("Build it"));
    }

    #[tokio::test]
    async fn test_completion_notes() {
        let temp = TempDir::new().unwrap();
        let (runner, _) = runner(&temp, ScriptedWorkUnit::new().respond("all done <promise>DONE</promise>"));

        let outcome = runner.run(&state(PromptSource::inline("Task")), "").await;
        assert!(outcome.completion_found);
        assert_eq!(outcome.notes, "Completion token found: <promise>DONE</promise>");
    }

    #[tokio::test]
    async fn test_work_unit_failure_becomes_outcome() {
        let temp = TempDir::new().unwrap();
        let (runner, _) = runner(&temp, ScriptedWorkUnit::new().fail("boom").fail("boom"));
        let s = state(PromptSource::inline("Task"));

        let first = runner.run(&s, "").await;
        let second = runner.run(&s, "").await;

        assert!(!first.success);
        assert!(first.changed_resources.is_empty());
        assert_eq!(first.notes, "work unit failed: boom");
        assert_eq!(first.error_fingerprint, Some(fingerprint("work unit failed: boom")));
        assert_eq!(first.error_fingerprint, second.error_fingerprint);
        assert_eq!(first.session_id.as_deref(), Some("scripted-1"));
        assert_eq!(second.session_id.as_deref(), Some("scripted-2"));
    }

    #[tokio::test]
    async fn test_missing_prompt_file_is_failure_without_invoking() {
        let temp = TempDir::new().unwrap();
        let (runner, unit) = runner(&temp, ScriptedWorkUnit::new().repeat_respond("ok"));

        let outcome = runner.run(&state(PromptSource::file("PROMPT.md")), "").await;
        assert!(!outcome.success);
        assert!(outcome.notes.contains("Prompt file not found"));
        assert!(outcome.error_fingerprint.is_some());
        assert_eq!(unit.invocations(), 0);
    }
}
