//! Loop lifecycle integration tests
//!
//! Drives full runs through the command surface with a scripted work unit.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use ralph::config::LoopConfig;
use ralph::domain::{IterationResult, LoopSettings, LoopState, PromptSource, SafetyLimits, StopReason};
use ralph::environment::{Environment, GitEnvironment, GitOptions, NoopEnvironment};
use ralph::manager::{LoopManager, StartRequest};
use ralph::orchestrator::{Orchestrator, OrchestratorOptions};
use ralph::prompt::PromptBuilder;
use ralph::runner::IterationRunner;
use ralph::storage::{DEFAULT_STATE_DIR, LoopStorage, StateStore};
use ralph::work_unit::ScriptedWorkUnit;
use ralph::RalphError;
use tempfile::TempDir;

fn manager_with<E: Environment>(workdir: &Path, unit: ScriptedWorkUnit, env: E) -> LoopManager<ScriptedWorkUnit, E> {
    let storage = LoopStorage::open(workdir.join(DEFAULT_STATE_DIR));
    let runner = IterationRunner::new(Arc::new(unit), PromptBuilder::new(workdir));
    let orchestrator = Orchestrator::new(storage, runner, Arc::new(env)).with_options(OrchestratorOptions {
        iteration_delay: Duration::ZERO,
        ..Default::default()
    });
    LoopManager::new(workdir, orchestrator, LoopConfig::default())
}

fn manager(workdir: &Path, unit: ScriptedWorkUnit) -> LoopManager<ScriptedWorkUnit, NoopEnvironment> {
    manager_with(workdir, unit, NoopEnvironment)
}

fn request(max_iterations: u32, no_change_limit: u32, repeat_error_limit: u32) -> StartRequest {
    StartRequest {
        max_iterations: Some(max_iterations),
        no_change_limit: Some(no_change_limit),
        repeat_error_limit: Some(repeat_error_limit),
        require_clean_start: Some(false),
        ..StartRequest::inline("Implement the counter")
    }
}

fn state_store(workdir: &Path) -> StateStore {
    LoopStorage::open(workdir.join(DEFAULT_STATE_DIR)).state
}

#[tokio::test]
async fn test_runs_to_iteration_limit() {
    let temp = TempDir::new().unwrap();
    let m = manager(temp.path(), ScriptedWorkUnit::new().repeat_respond("I modified src/counter.rs"));

    let reason = m.start(request(3, 3, 3)).await.unwrap();
    assert_eq!(reason, StopReason::MaxIterations);

    let state = m.status().unwrap();
    assert_eq!(state.iteration, 3);
    assert!(!state.active);
    assert_eq!(state.no_progress_count, 0);

    let history = m.log(10).unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|e| e.result == IterationResult::Continue));
    assert_eq!(history.iter().map(|e| e.iteration).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(history.iter().all(|e| e.changed_resources == vec!["src/counter.rs"]));
}

#[tokio::test]
async fn test_stops_without_progress() {
    let temp = TempDir::new().unwrap();
    let m = manager(temp.path(), ScriptedWorkUnit::new().repeat_respond("Reviewed the code, nothing to change."));

    let reason = m.start(request(10, 2, 3)).await.unwrap();
    assert_eq!(reason, StopReason::NoProgress);

    let state = m.status().unwrap();
    assert_eq!(state.iteration, 2);
    assert_eq!(state.no_progress_count, 2);
}

#[tokio::test]
async fn test_repeated_error_across_resumes() {
    let temp = TempDir::new().unwrap();
    let m = manager(temp.path(), ScriptedWorkUnit::new().repeat_fail("compiler exploded"));

    assert_eq!(m.start(request(10, 3, 3)).await.unwrap(), StopReason::IterationError);
    assert_eq!(m.status().unwrap().consecutive_error_count, 1);

    assert_eq!(m.resume().await.unwrap(), StopReason::IterationError);
    assert_eq!(m.status().unwrap().consecutive_error_count, 2);

    assert_eq!(m.resume().await.unwrap(), StopReason::RepeatedError);
    let state = m.status().unwrap();
    assert_eq!(state.iteration, 3);
    assert_eq!(state.consecutive_error_count, 3);

    let history = m.log(10).unwrap();
    assert!(history.iter().all(|e| e.result == IterationResult::Error));
    assert!(history.windows(2).all(|w| w[0].error_fingerprint == w[1].error_fingerprint));
}

#[tokio::test]
async fn test_completion_token_wins() {
    let temp = TempDir::new().unwrap();
    let unit = ScriptedWorkUnit::new()
        .respond("nothing yet")
        .respond("nothing yet")
        .respond("All tasks complete. DONE");
    let m = manager(temp.path(), unit);

    // no_change_limit 3 would trip on the third iteration without the token
    assert_eq!(m.start(request(10, 3, 3)).await.unwrap(), StopReason::CompletionPromise);
    let history = m.log(10).unwrap();
    assert_eq!(history.last().unwrap().result, IterationResult::Done);
}

#[tokio::test]
async fn test_permission_blocked_across_resumes() {
    let temp = TempDir::new().unwrap();
    let m = manager(temp.path(), ScriptedWorkUnit::new().repeat_fail("write failed: Permission denied"));

    assert_eq!(m.start(request(10, 3, 5)).await.unwrap(), StopReason::IterationError);
    assert_eq!(m.resume().await.unwrap(), StopReason::PermissionBlocked);
    assert_eq!(m.status().unwrap().consecutive_error_count, 2);
}

#[tokio::test]
async fn test_kill_switch_flip_stops_after_current_iteration() {
    let temp = TempDir::new().unwrap();
    let store = state_store(temp.path());
    let unit = ScriptedWorkUnit::new()
        .repeat_respond("modified src/lib.rs")
        .on_invoke(move |n| {
            if n == 2 {
                let mut disk = store.load().unwrap().unwrap();
                disk.active = false;
                store.save(&disk).unwrap();
            }
        });
    let m = manager(temp.path(), unit);

    assert_eq!(m.start(request(10, 3, 3)).await.unwrap(), StopReason::KillSwitch);
    let state = m.status().unwrap();
    assert_eq!(state.iteration, 2);
    assert_eq!(m.log(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_pause_from_another_handle_then_resume() {
    let temp = TempDir::new().unwrap();
    let controller = Arc::new(manager(temp.path(), ScriptedWorkUnit::new()));
    let pauser = Arc::clone(&controller);
    let unit = ScriptedWorkUnit::new()
        .repeat_respond("modified src/lib.rs")
        .on_invoke(move |n| {
            if n == 1 {
                pauser.pause().unwrap();
            }
        });
    let m = manager(temp.path(), unit);

    assert_eq!(m.start(request(3, 3, 3)).await.unwrap(), StopReason::UserPaused);
    let paused = controller.status().unwrap();
    assert!(paused.is_paused());
    assert_eq!(paused.iteration, 1);

    assert_eq!(m.resume().await.unwrap(), StopReason::MaxIterations);
    assert_eq!(m.status().unwrap().iteration, 3);
}

#[tokio::test]
async fn test_stop_command_records_user_stop() {
    let temp = TempDir::new().unwrap();
    let m = manager(temp.path(), ScriptedWorkUnit::new().repeat_respond("nothing"));
    m.start(request(1, 3, 3)).await.unwrap();

    let mut state = m.status().unwrap();
    state.reactivate();
    state_store(temp.path()).save(&state).unwrap();

    let stopped = m.stop().unwrap();
    assert_eq!(stopped.stop_reason, Some(StopReason::UserStop));
    assert_eq!(m.run().await.unwrap(), StopReason::UserStop);
}

#[tokio::test]
async fn test_missing_state_is_configuration_error() {
    let temp = TempDir::new().unwrap();
    let m = manager(temp.path(), ScriptedWorkUnit::new());

    assert!(matches!(m.run().await, Err(RalphError::Configuration(_))));
    assert!(matches!(m.status(), Err(RalphError::Configuration(_))));
    assert!(!state_store(temp.path()).exists());
}

#[tokio::test]
async fn test_start_refused_while_active_then_recovered() {
    let temp = TempDir::new().unwrap();

    // Simulate a process that crashed mid-run at iteration 1
    let mut crashed = LoopState::new(LoopSettings {
        prompt: PromptSource::inline("Implement the counter"),
        completion_token: "DONE".into(),
        max_iterations: 3,
        max_runtime_minutes: 60,
        safety: SafetyLimits {
            require_clean_start: false,
            ..Default::default()
        },
    })
    .unwrap();
    crashed.iteration = 1;
    state_store(temp.path()).save(&crashed).unwrap();

    let m = manager(temp.path(), ScriptedWorkUnit::new().repeat_respond("modified src/lib.rs"));
    assert!(matches!(m.start(request(5, 3, 3)).await, Err(RalphError::InvalidState(_))));
    assert!(matches!(m.resume().await, Err(RalphError::InvalidState(_))));

    assert_eq!(m.run().await.unwrap(), StopReason::MaxIterations);
    let state = m.status().unwrap();
    assert_eq!(state.iteration, 3);
    assert_eq!(m.log(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_prompt_file_and_inputs_reach_work_unit() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("PROMPT.md"), "Follow the plan.").unwrap();
    std::fs::write(temp.path().join("progress.md"), "step 1 done").unwrap();
    std::fs::write(temp.path().join("prd.json"), "{}").unwrap();
    std::fs::write(temp.path().join("IMPLEMENTATION_PLAN.md"), "- [ ] step 2").unwrap();

    let unit = Arc::new(ScriptedWorkUnit::new().repeat_respond("DONE"));
    let storage = LoopStorage::open(temp.path().join(DEFAULT_STATE_DIR));
    let runner = IterationRunner::new(Arc::clone(&unit), PromptBuilder::new(temp.path()));
    let orchestrator = Orchestrator::new(storage, runner, Arc::new(NoopEnvironment));
    let m = LoopManager::new(temp.path(), orchestrator, LoopConfig::default());

    let request = StartRequest {
        require_clean_start: Some(false),
        ..StartRequest::file("PROMPT.md")
    };
    assert_eq!(m.start(request).await.unwrap(), StopReason::CompletionPromise);

    let prompt = &unit.prompts()[0];
    let prd = prompt.find("--- Content of prd.json ---").unwrap();
    let progress = prompt.find("--- Content of progress.md ---").unwrap();
    let plan = prompt.find("@IMPLEMENTATION_PLAN.md:").unwrap();
    assert!(prd < progress && progress < plan);
    assert!(prompt.ends_with("Follow the plan."));
}

fn git(dir: &Path, args: &[&str]) {
    Command::new("git").args(args).current_dir(dir).output().unwrap();
}

fn setup_git_repo(dir: &Path) {
    git(dir, &["init"]);
    git(dir, &["config", "user.email", "test@test.com"]);
    git(dir, &["config", "user.name", "Test"]);
    std::fs::write(dir.join("README.md"), "# Counter").unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", "Initial commit"]);
}

#[tokio::test]
async fn test_dirty_start_refused() {
    let temp = TempDir::new().unwrap();
    setup_git_repo(temp.path());
    std::fs::write(temp.path().join("README.md"), "# Uncommitted").unwrap();

    let env = GitEnvironment::new(temp.path(), DEFAULT_STATE_DIR, GitOptions::default());
    let m = manager_with(temp.path(), ScriptedWorkUnit::new().repeat_respond("modified src/lib.rs"), env);
    let request = StartRequest {
        require_clean_start: Some(true),
        ..request(3, 3, 3)
    };

    assert_eq!(m.start(request).await.unwrap(), StopReason::DirtyStart);
    let state = m.status().unwrap();
    assert_eq!(state.iteration, 0);
    assert!(m.log(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_git_commits_each_iteration() {
    let temp = TempDir::new().unwrap();
    setup_git_repo(temp.path());

    let workdir = temp.path().to_path_buf();
    let unit = ScriptedWorkUnit::new().repeat_respond("modified notes.txt").on_invoke(move |n| {
        std::fs::write(workdir.join("notes.txt"), format!("iteration {}", n)).unwrap();
    });
    let env = GitEnvironment::new(temp.path(), DEFAULT_STATE_DIR, GitOptions::default());
    let m = manager_with(temp.path(), unit, env);
    let request = StartRequest {
        require_clean_start: Some(true),
        ..request(3, 3, 3)
    };

    assert_eq!(m.start(request).await.unwrap(), StopReason::MaxIterations);

    let log = Command::new("git")
        .args(["log", "--format=%s"])
        .current_dir(temp.path())
        .output()
        .unwrap();
    let subjects = String::from_utf8_lossy(&log.stdout).to_string();
    // the final iteration is terminal and is not committed
    assert_eq!(subjects.lines().collect::<Vec<_>>(), vec!["Ralph iteration 2", "Ralph iteration 1", "Initial commit"]);
}
