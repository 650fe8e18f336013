//! Error types for inference engine operations

use thiserror::Error;

/// Errors that can occur when talking to the inference engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Network-level failures (connection refused, DNS, timeouts)
    #[error("Connection error: {message}")]
    Connection {
        /// Error message
        message: String,
    },

    /// The engine answered with a non-success status
    #[error("Engine returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error body or status text
        message: String,
    },

    /// The engine's response could not be decoded
    #[error("Malformed engine response: {message}")]
    Malformed {
        /// Error message
        message: String,
    },

    /// Startup-time failures (model missing, bad base URL)
    #[error("Engine initialization failed: {message}")]
    Init {
        /// Error message
        message: String,
    },
}

impl EngineError {
    /// Creates a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an API error from a status code and body
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a malformed-response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates an initialization error
    pub fn init(message: impl Into<String>) -> Self {
        Self::Init {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Connection {
                message: format!("request timed out: {}", err),
            }
        } else if err.is_connect() {
            Self::Connection {
                message: format!(
                    "{}. Is the engine server running and reachable?",
                    err
                ),
            }
        } else if err.is_decode() {
            Self::Malformed {
                message: err.to_string(),
            }
        } else {
            Self::Connection {
                message: err.to_string(),
            }
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::connection("connection refused");
        assert!(err.to_string().contains("connection refused"));

        let err = EngineError::api(503, "model loading");
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model loading"));

        let err = EngineError::init("model 'missing' not found");
        assert!(err.to_string().contains("initialization failed"));
    }
}
