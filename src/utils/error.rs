//! Centralized error types for promptlane
//!
//! Library code returns structured `GatewayError` values via `thiserror`;
//! the binary/daemon layer wraps them with `anyhow` for context.

use thiserror::Error;

use crate::engine::EngineError;

/// Errors returned by the session store, scheduler and gateway facade.
///
/// Every error is delivered to the caller that triggered it; none of these
/// abort the execution lane or affect other queued requests.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The session id does not refer to a live session
    #[error("session not found: {id}")]
    NotFound { id: String },

    /// An explicitly supplied session id is already live
    #[error("session id already in use: {id}")]
    DuplicateId { id: String },

    /// The concurrent-session ceiling has been reached
    #[error("session limit reached ({limit} live sessions)")]
    CapacityExceeded { limit: usize },

    /// Empty message, empty role string, or other rejected caller input
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The inference call itself failed
    #[error("inference failed: {0}")]
    Engine(#[from] EngineError),
}

impl GatewayError {
    /// Create a not-found error for a session id
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a duplicate-id error
    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Self::DuplicateId { id: id.into() }
    }

    /// Create a capacity error carrying the configured ceiling
    pub fn capacity_exceeded(limit: usize) -> Self {
        Self::CapacityExceeded { limit }
    }

    /// Create an invalid-input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Returns true if the error was caused by the caller's request rather
    /// than by the engine or the gateway itself.
    ///
    /// Transport layers use this to pick a 4xx-style status over a
    /// 5xx-style one.
    pub fn is_client_error(&self) -> bool {
        match self {
            GatewayError::NotFound { .. }
            | GatewayError::DuplicateId { .. }
            | GatewayError::CapacityExceeded { .. }
            | GatewayError::InvalidInput { .. } => true,
            GatewayError::Engine(_) => false,
        }
    }
}

/// Result type alias using GatewayError
pub type Result<T> = std::result::Result<T, GatewayError>;
