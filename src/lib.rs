//! promptlane: one inference engine, many isolated conversations
//!
//! A request scheduler and session-lifecycle manager for a serial,
//! stateful inference resource. Any number of clients hold isolated
//! conversations while every engine call funnels through a single FIFO
//! execution lane; an inactivity reaper reclaims abandoned sessions.
//!
//! The pieces, leaf-first:
//!
//! - [`engine`]: the inference engine boundary (trait + Ollama adapter)
//! - [`session`]: session store, history types, inactivity reaper
//! - [`scheduler`]: the single execution lane all requests drain through
//! - [`role`]: the process-wide mutable system role
//! - [`gateway`]: the facade a transport layer talks to, plus the daemon
//! - [`config`]: layered configuration (file, environment, CLI)

pub mod config;
pub mod engine;
pub mod gateway;
pub mod role;
pub mod scheduler;
pub mod session;
pub mod utils;
