//! Work-unit boundary.
//!
//! A work unit consumes one prompt and returns the agent's textual output.
//! The loop never looks behind this trait.

mod command;
mod scripted;

use async_trait::async_trait;
use thiserror::Error;

pub use command::{CommandWorkUnit, SESSION_ENV_VAR};
pub use scripted::ScriptedWorkUnit;

/// Errors a work unit can report
#[derive(Debug, Error)]
pub enum WorkUnitError {
    /// The work unit could not be started at all
    #[error("work unit unavailable: {0}")]
    Unavailable(String),

    /// The work unit ran and reported failure
    #[error("work unit failed: {0}")]
    Failed(String),

    #[error("work unit timed out after {0}ms")]
    Timeout(u64),

    #[error("work unit IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure inside a started session; displays as the inner error
    #[error("{source}")]
    InSession {
        session_id: String,
        source: Box<WorkUnitError>,
    },
}

impl WorkUnitError {
    /// Attach the id of the session this failure happened in
    pub fn in_session(self, session_id: impl Into<String>) -> Self {
        match self {
            WorkUnitError::InSession { .. } => self,
            other => WorkUnitError::InSession {
                session_id: session_id.into(),
                source: Box::new(other),
            },
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            WorkUnitError::InSession { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    /// The failure itself, without session context
    pub fn root(&self) -> &WorkUnitError {
        match self {
            WorkUnitError::InSession { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Output of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkUnitResponse {
    pub output: String,
    pub session_id: Option<String>,
}

impl WorkUnitResponse {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// An expensive external step driven by a prompt
#[async_trait]
pub trait WorkUnit: Send + Sync {
    /// Run one session with `prompt` and return its output
    async fn invoke(&self, prompt: &str) -> Result<WorkUnitResponse, WorkUnitError>;
}
