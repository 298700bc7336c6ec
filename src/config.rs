use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::environment::GitOptions;
use crate::orchestrator::{DEFAULT_HISTORY_NOTES_MAX_CHARS, DEFAULT_ITERATION_DELAY_MS, OrchestratorOptions};
use crate::prompt::{DEFAULT_NOTES_MAX_CHARS, DEFAULT_PLAN_FILE};
use crate::storage::DEFAULT_STATE_DIR;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Log filter used when `RUST_LOG` is unset, e.g. `debug` or `ralph=trace`
    pub log_level: Option<String>,
    /// State directory, relative to the working directory unless absolute
    pub state_dir: PathBuf,
    pub plan_file: String,
    pub work_unit: WorkUnitConfig,
    #[serde(rename = "loop")]
    pub looping: LoopConfig,
    pub git: GitConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct WorkUnitConfig {
    /// Shell command run once per iteration; receives the prompt on stdin
    pub command: String,
    pub timeout_ms: u64,
}

impl Default for WorkUnitConfig {
    fn default() -> Self {
        Self {
            command: "opencode run".to_string(),
            timeout_ms: 1_800_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoopConfig {
    pub iteration_delay_ms: u64,
    pub notes_max_chars: usize,
    pub history_notes_max_chars: usize,
    pub default_max_iterations: u32,
    pub default_max_runtime_minutes: u64,
    pub default_no_change_limit: u32,
    pub default_repeat_error_limit: u32,
    pub default_require_clean_start: bool,
    pub default_completion_token: String,
    /// Inputs prepended to the prompt when `start` names none; missing files are skipped
    pub default_additional_inputs: Vec<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            iteration_delay_ms: DEFAULT_ITERATION_DELAY_MS,
            notes_max_chars: DEFAULT_NOTES_MAX_CHARS,
            history_notes_max_chars: DEFAULT_HISTORY_NOTES_MAX_CHARS,
            default_max_iterations: 25,
            default_max_runtime_minutes: 240,
            default_no_change_limit: 3,
            default_repeat_error_limit: 3,
            default_require_clean_start: true,
            default_completion_token: "DONE".to_string(),
            default_additional_inputs: vec!["progress.md".to_string(), "prd.json".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GitConfig {
    pub commit_after_iteration: bool,
    pub push: bool,
    /// `{iteration}` is replaced with the iteration number
    pub commit_message: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        let options = GitOptions::default();
        Self {
            commit_after_iteration: options.commit_after_iteration,
            push: options.push,
            commit_message: options.commit_message,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            plan_file: DEFAULT_PLAN_FILE.to_string(),
            work_unit: WorkUnitConfig::default(),
            looping: LoopConfig::default(),
            git: GitConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. ralph.yml in the working directory
    /// 3. ~/.config/ralph/ralph.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>, workdir: &Path) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");
        let project_config = workdir.join(format!("{}.yml", project_name));
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", project_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject values no loop could run with
    pub fn validate(&self) -> Result<()> {
        let l = &self.looping;
        if l.default_max_iterations == 0 {
            bail!("loop.default-max-iterations must be > 0");
        }
        if l.default_max_runtime_minutes == 0 {
            bail!("loop.default-max-runtime-minutes must be > 0");
        }
        if l.default_no_change_limit == 0 {
            bail!("loop.default-no-change-limit must be > 0");
        }
        if l.default_repeat_error_limit == 0 {
            bail!("loop.default-repeat-error-limit must be > 0");
        }
        if l.default_completion_token.trim().is_empty() {
            bail!("loop.default-completion-token must not be empty");
        }
        if self.work_unit.timeout_ms == 0 {
            bail!("work-unit.timeout-ms must be > 0");
        }
        if self.work_unit.command.trim().is_empty() {
            bail!("work-unit.command must not be empty");
        }
        if self.plan_file.trim().is_empty() {
            bail!("plan-file must not be empty");
        }
        Ok(())
    }

    /// Default log filter for env_logger
    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// State directory resolved against `workdir`
    pub fn state_dir(&self, workdir: &Path) -> PathBuf {
        if self.state_dir.is_absolute() {
            self.state_dir.clone()
        } else {
            workdir.join(&self.state_dir)
        }
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            iteration_delay: Duration::from_millis(self.looping.iteration_delay_ms),
            notes_max_chars: self.looping.notes_max_chars,
            history_notes_max_chars: self.looping.history_notes_max_chars,
        }
    }

    pub fn git_options(&self) -> GitOptions {
        GitOptions {
            commit_after_iteration: self.git.commit_after_iteration,
            push: self.git.push,
            commit_message: self.git.commit_message.clone(),
        }
    }
}
