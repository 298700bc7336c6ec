// Scripted work unit: replays a fixed sequence of responses

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{WorkUnit, WorkUnitError, WorkUnitResponse};

#[derive(Debug, Clone)]
enum Step {
    Respond(WorkUnitResponse),
    Fail(String),
}

type InvokeHook = Box<dyn Fn(usize) + Send + Sync>;

/// Work unit that answers from a queue, for tests and dry runs.
///
/// Once the queue is empty the fallback step repeats; with no fallback the
/// invocation fails as unavailable. Every prompt received is recorded.
#[derive(Default)]
pub struct ScriptedWorkUnit {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<Step>,
    prompts: Mutex<Vec<String>>,
    on_invoke: Option<InvokeHook>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedWorkUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    pub fn respond(self, output: impl Into<String>) -> Self {
        lock(&self.steps).push_back(Step::Respond(WorkUnitResponse::new(output)));
        self
    }

    /// Queue a failure
    pub fn fail(self, message: impl Into<String>) -> Self {
        lock(&self.steps).push_back(Step::Fail(message.into()));
        self
    }

    /// Respond with `output` once the queue runs dry
    pub fn repeat_respond(mut self, output: impl Into<String>) -> Self {
        self.fallback = Some(Step::Respond(WorkUnitResponse::new(output)));
        self
    }

    /// Fail with `message` once the queue runs dry
    pub fn repeat_fail(mut self, message: impl Into<String>) -> Self {
        self.fallback = Some(Step::Fail(message.into()));
        self
    }

    /// Run `hook` with the 1-based invocation number before answering
    pub fn on_invoke(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_invoke = Some(Box::new(hook));
        self
    }

    /// Prompts received so far, in order
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn invocations(&self) -> usize {
        lock(&self.prompts).len()
    }
}

#[async_trait]
impl WorkUnit for ScriptedWorkUnit {
    async fn invoke(&self, prompt: &str) -> Result<WorkUnitResponse, WorkUnitError> {
        let count = {
            let mut prompts = lock(&self.prompts);
            prompts.push(prompt.to_string());
            prompts.len()
        };

        if let Some(hook) = &self.on_invoke {
            hook(count);
        }

        let step = lock(&self.steps).pop_front().or_else(|| self.fallback.clone());
        let session_id = format!("scripted-{}", count);

        match step {
            Some(Step::Respond(resp)) => Ok(WorkUnitResponse {
                session_id: resp.session_id.or(Some(session_id)),
                output: resp.output,
            }),
            Some(Step::Fail(message)) => Err(WorkUnitError::Failed(message).in_session(session_id)),
            None => Err(WorkUnitError::Unavailable("script exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_replays_queue_then_fallback() {
        let unit = ScriptedWorkUnit::new().respond("one").fail("boom").repeat_respond("again");

        assert_eq!(unit.invoke("p1").await.unwrap().output, "one");
        let err = unit.invoke("p2").await.unwrap_err();
        assert!(matches!(err.root(), WorkUnitError::Failed(m) if m == "boom"));
        assert_eq!(err.session_id(), Some("scripted-2"));
        assert_eq!(unit.invoke("p3").await.unwrap().output, "again");
        assert_eq!(unit.invoke("p4").await.unwrap().output, "again");
        assert_eq!(unit.prompts(), vec!["p1", "p2", "p3", "p4"]);
    }

    #[tokio::test]
    async fn test_exhausted_without_fallback() {
        let unit = ScriptedWorkUnit::new();
        assert!(matches!(unit.invoke("p").await, Err(WorkUnitError::Unavailable(_))));
        assert_eq!(unit.invocations(), 1);
    }

    #[tokio::test]
    async fn test_session_ids_and_hook() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_hook = Arc::clone(&seen);
        let unit = ScriptedWorkUnit::new()
            .repeat_respond("ok")
            .on_invoke(move |n| seen_hook.store(n, Ordering::SeqCst));

        let first = unit.invoke("a").await.unwrap();
        let second = unit.invoke("b").await.unwrap();
        assert_eq!(first.session_id.as_deref(), Some("scripted-1"));
        assert_eq!(second.session_id.as_deref(), Some("scripted-2"));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
