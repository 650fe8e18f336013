//! Mock inference engine for testing
//!
//! Provides an in-memory implementation of `InferenceEngine` with call
//! counters, error injection and a configurable per-call delay. The
//! concurrency high-water mark (`max_active`) is what the scheduler tests
//! use to prove at most one engine call is ever in flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::{EngineContext, EngineError, InferenceEngine};

/// Shared observable state behind every context the mock hands out
#[derive(Default)]
struct MockState {
    /// Prefix prepended to the echoed prompt text
    reply_prefix: Mutex<String>,
    /// Error to return from the next prompt call (consumed once)
    fail_next_prompt: Mutex<Option<EngineError>>,
    /// Error to return from every release call
    fail_release: Mutex<Option<EngineError>>,
    /// Artificial latency per prompt call
    prompt_delay: Mutex<Duration>,
    /// Last system string seen by any context
    last_system: Mutex<Option<String>>,
    /// Prompt texts in the order the engine processed them
    prompt_log: Mutex<Vec<String>>,
    /// Total prompt calls across all contexts
    calls: AtomicUsize,
    /// Currently executing prompt calls
    active: AtomicUsize,
    /// High-water mark of concurrently executing prompt calls
    max_active: AtomicUsize,
    /// Contexts handed out
    contexts_created: AtomicUsize,
    /// Contexts released
    contexts_released: AtomicUsize,
}

/// Mock engine for tests
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        let engine = Self::default();
        *engine.state.reply_prefix.lock().unwrap() = "echo: ".to_string();
        engine
    }

    /// Sets the prefix of the echoed reply ("<prefix><prompt text>")
    pub fn set_reply_prefix(&self, prefix: impl Into<String>) {
        *self.state.reply_prefix.lock().unwrap() = prefix.into();
    }

    /// Makes the next prompt call fail with the given error
    pub fn fail_next_prompt(&self, error: EngineError) {
        *self.state.fail_next_prompt.lock().unwrap() = Some(error);
    }

    /// Makes every release call fail with the given error
    pub fn fail_release(&self, error: EngineError) {
        *self.state.fail_release.lock().unwrap() = Some(error);
    }

    /// Adds artificial latency to every prompt call
    pub fn set_prompt_delay(&self, delay: Duration) {
        *self.state.prompt_delay.lock().unwrap() = delay;
    }

    /// Total prompt calls across all contexts
    pub fn call_count(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Highest number of prompt calls ever running at the same time
    pub fn max_concurrent_calls(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }

    /// Contexts handed out so far
    pub fn contexts_created(&self) -> usize {
        self.state.contexts_created.load(Ordering::SeqCst)
    }

    /// Contexts released so far
    pub fn contexts_released(&self) -> usize {
        self.state.contexts_released.load(Ordering::SeqCst)
    }

    /// Last system string seen by any context
    pub fn last_system(&self) -> Option<String> {
        self.state.last_system.lock().unwrap().clone()
    }

    /// Prompt texts in processing order
    pub fn prompts(&self) -> Vec<String> {
        self.state.prompt_log.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl InferenceEngine for MockEngine {
    async fn create_context(&self) -> Result<Box<dyn EngineContext>, EngineError> {
        self.state.contexts_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockContext {
            state: Arc::clone(&self.state),
            released: false,
        }))
    }

    fn engine_name(&self) -> &'static str {
        "mock"
    }
}

struct MockContext {
    state: Arc<MockState>,
    released: bool,
}

#[async_trait::async_trait]
impl EngineContext for MockContext {
    async fn prompt(&mut self, system: &str, text: &str) -> Result<String, EngineError> {
        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_active.fetch_max(active, Ordering::SeqCst);
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        *self.state.last_system.lock().unwrap() = Some(system.to_string());
        self.state.prompt_log.lock().unwrap().push(text.to_string());

        let delay = *self.state.prompt_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = match self.state.fail_next_prompt.lock().unwrap().take() {
            Some(error) => Err(error),
            None => {
                let prefix = self.state.reply_prefix.lock().unwrap().clone();
                Ok(format!("{}{}", prefix, text))
            }
        };

        self.state.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn release(&mut self) -> Result<(), EngineError> {
        assert!(!self.released, "context released twice");
        self.released = true;
        self.state.contexts_released.fetch_add(1, Ordering::SeqCst);
        match self.state.fail_release.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_prompt() {
        let engine = MockEngine::new();
        let mut ctx = engine.create_context().await.unwrap();

        let reply = ctx.prompt("system", "hello").await.unwrap();
        assert_eq!(reply, "echo: hello");
        assert_eq!(engine.call_count(), 1);
        assert_eq!(engine.last_system(), Some("system".to_string()));
    }

    #[tokio::test]
    async fn test_mock_error_injection_is_one_shot() {
        let engine = MockEngine::new();
        let mut ctx = engine.create_context().await.unwrap();
        engine.fail_next_prompt(EngineError::api(500, "boom"));

        assert!(ctx.prompt("s", "first").await.is_err());
        assert!(ctx.prompt("s", "second").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_tracks_context_lifecycle() {
        let engine = MockEngine::new();
        let mut ctx = engine.create_context().await.unwrap();
        assert_eq!(engine.contexts_created(), 1);
        assert_eq!(engine.contexts_released(), 0);

        ctx.release().await.unwrap();
        assert_eq!(engine.contexts_released(), 1);
    }
}
