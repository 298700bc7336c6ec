//! Prompt assembly for one iteration.
//!
//! Final layout, top to bottom:
//! 1. additional inputs, last-listed first, each wrapped in content markers
//! 2. the plan document
//! 3. the carryover context from the previous iteration
//! 4. the base prompt (inline text or prompt file)

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::domain::{LoopState, PromptMode};
use crate::error::{RalphError, Result};

/// Default plan document, relative to the working directory.
pub const DEFAULT_PLAN_FILE: &str = "IMPLEMENTATION_PLAN.md";

/// Builds iteration prompts from files under a working directory
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    workdir: PathBuf,
    plan_file: String,
}

impl PromptBuilder {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            plan_file: DEFAULT_PLAN_FILE.to_string(),
        }
    }

    pub fn with_plan_file(mut self, plan_file: impl Into<String>) -> Self {
        self.plan_file = plan_file.into();
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Assemble the prompt for the next iteration.
    ///
    /// Fails only when the base prompt itself cannot be produced.
    pub fn build(&self, state: &LoopState, carryover: &str) -> Result<String> {
        let mut sections = Vec::new();

        for (name, content) in self.read_additional_inputs(&state.prompt.additional_inputs).into_iter().rev() {
            sections.push(format!(
                "--- Content of {name} ---\n{content}\n--- End of {name} ---"
            ));
        }

        if let Some(plan) = self.read_plan() {
            sections.push(format!("@{}:\n{}", self.plan_file, plan));
        }

        if !carryover.trim().is_empty() {
            sections.push(format!("Previous context:\n{}", carryover));
        }

        sections.push(self.base_prompt(state)?);

        let prompt = sections.join("\n\n");
        debug!("Built prompt: {} sections, {} chars", sections.len(), prompt.len());
        Ok(prompt)
    }

    /// The inline prompt, or the content of the configured prompt file.
    pub fn base_prompt(&self, state: &LoopState) -> Result<String> {
        match state.prompt.mode {
            PromptMode::Inline => Ok(state.prompt.value.clone()),
            PromptMode::File => {
                let path = self.workdir.join(&state.prompt.value);
                fs::read_to_string(&path).map_err(|e| {
                    RalphError::Configuration(format!("Prompt file not found: {} ({})", path.display(), e))
                })
            }
        }
    }

    /// Plan document content, if present and non-empty.
    pub fn read_plan(&self) -> Option<String> {
        let path = self.workdir.join(&self.plan_file);
        match fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => Some(content),
            Ok(_) => None,
            Err(e) => {
                if path.exists() {
                    warn!("Failed to read plan {}: {}", path.display(), e);
                }
                None
            }
        }
    }

    /// Read each configured input in listed order, expanding glob patterns.
    /// Missing or unreadable inputs are skipped with a warning.
    fn read_additional_inputs(&self, inputs: &[String]) -> Vec<(String, String)> {
        let mut found = Vec::new();

        for input in inputs {
            for name in self.expand_input(input) {
                let path = self.workdir.join(&name);
                match fs::read_to_string(&path) {
                    Ok(content) => found.push((name, content)),
                    Err(e) => warn!("Skipping additional input {}: {}", path.display(), e),
                }
            }
        }

        found
    }

    fn expand_input(&self, input: &str) -> Vec<String> {
        if !input.contains(|c| matches!(c, '*' | '?' | '[')) {
            return vec![input.to_string()];
        }

        let pattern = self.workdir.join(input);
        let Some(pattern) = pattern.to_str() else {
            warn!("Non-UTF-8 input pattern skipped: {}", input);
            return vec![];
        };

        match glob::glob(pattern) {
            Ok(paths) => {
                let mut names: Vec<String> = paths
                    .filter_map(|p| p.ok())
                    .filter(|p| p.is_file())
                    .filter_map(|p| {
                        p.strip_prefix(&self.workdir)
                            .ok()
                            .map(|rel| rel.to_string_lossy().into_owned())
                    })
                    .collect();
                names.sort();
                names
            }
            Err(e) => {
                warn!("Invalid input pattern '{}': {}", input, e);
                vec![]
            }
        }
    }
}
