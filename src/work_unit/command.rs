// Work unit that runs an agent command as a child process

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{WorkUnit, WorkUnitError, WorkUnitResponse};
use crate::id::generate_session_id;

/// Environment variable carrying the per-invocation session id
pub const SESSION_ENV_VAR: &str = "RALPH_SESSION_ID";

/// Runs `sh -c <command>` in a working directory with the prompt on stdin
#[derive(Debug, Clone)]
pub struct CommandWorkUnit {
    command: String,
    workdir: PathBuf,
    timeout_ms: u64,
    env: Vec<(String, String)>,
}

impl CommandWorkUnit {
    pub fn new(command: impl Into<String>, workdir: impl Into<PathBuf>, timeout_ms: u64) -> Self {
        Self {
            command: command.into(),
            workdir: workdir.into(),
            timeout_ms,
            env: Vec::new(),
        }
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn execute(&self, prompt: &str, session_id: &str) -> Result<std::process::Output, WorkUnitError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.command);
        cmd.current_dir(&self.workdir);
        cmd.env(SESSION_ENV_VAR, session_id);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| WorkUnitError::Unavailable(format!("failed to spawn '{}': {}", self.command, e)))?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A command that ignores stdin may close it early
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    debug!("Work unit closed stdin early: {}", e);
                }
            }
        };

        // stdout must drain while the prompt is still being written
        let session = async move {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        let timeout = tokio::time::Duration::from_millis(self.timeout_ms);
        match tokio::time::timeout(timeout, session).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(WorkUnitError::Timeout(self.timeout_ms)),
        }
    }
}

#[async_trait]
impl WorkUnit for CommandWorkUnit {
    async fn invoke(&self, prompt: &str) -> Result<WorkUnitResponse, WorkUnitError> {
        let session_id = generate_session_id();
        debug!("Invoking work unit session={} command='{}'", session_id, self.command);

        let output = self
            .execute(prompt, &session_id)
            .await
            .map_err(|e| e.in_session(&session_id))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("exit code {:?}", output.status.code())
            } else {
                format!("exit code {:?}: {}", output.status.code(), stderr.trim())
            };
            warn!("Work unit session {} failed: {}", session_id, message);
            return Err(WorkUnitError::Failed(message).in_session(session_id));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        Ok(WorkUnitResponse::new(stdout).with_session(session_id))
    }
}
