//! Inference engine boundary for promptlane
//!
//! The engine is the single shared resource capable of producing one
//! response at a time. It is treated as a black box behind two traits:
//! `InferenceEngine` hands out per-session context handles, and each
//! `EngineContext` turns a prompt into a response while carrying whatever
//! server-side state keeps the conversation coherent.
//!
//! # Example
//!
//! ```rust,no_run
//! use promptlane::engine::{EngineContext, InferenceEngine, OllamaEngine, OllamaEngineConfig};
//!
//! async fn example() {
//!     let engine = OllamaEngine::connect(OllamaEngineConfig::default())
//!         .await
//!         .expect("engine must be reachable at startup");
//!     let mut ctx = engine.create_context().await.unwrap();
//!     let reply = ctx.prompt("You are a helpful assistant.", "Hello!").await.unwrap();
//!     println!("{}", reply);
//! }
//! ```

pub mod error;
#[cfg(test)]
pub mod mock;
pub mod ollama;

pub use error::EngineError;
pub use ollama::{OllamaEngine, OllamaEngineConfig};

/// A per-session conversation context allocated from the engine.
///
/// A context is exclusively owned by one session. It must be released
/// exactly once, when the owning session is deleted; the session store
/// enforces that discipline.
#[async_trait::async_trait]
pub trait EngineContext: Send {
    /// Runs one inference turn: the current system role plus the user
    /// message in, the assistant response text out.
    async fn prompt(&mut self, system: &str, text: &str) -> Result<String, EngineError>;

    /// Releases any per-context resources held by the engine.
    async fn release(&mut self) -> Result<(), EngineError>;
}

/// The shared inference engine, created once at startup.
///
/// All implementations must be Send + Sync; the handle is shared across
/// tasks behind an `Arc`. `create_context` only allocates bookkeeping;
/// serialization of actual inference calls is the scheduler's job, not
/// the engine's.
#[async_trait::async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Allocates a fresh conversation context.
    async fn create_context(&self) -> Result<Box<dyn EngineContext>, EngineError>;

    /// Engine name, used for logging and identification
    fn engine_name(&self) -> &'static str;
}
