//! Process-wide system role
//!
//! The instruction text prefixed to every inference turn. One value for the
//! whole process: a write takes effect for all subsequent turns across all
//! sessions immediately. Not versioned.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::utils::{GatewayError, Result};

/// Shared, runtime-mutable system role string
#[derive(Clone)]
pub struct SystemRole {
    inner: Arc<RwLock<String>>,
}

impl SystemRole {
    /// Creates a role holder with the given initial text.
    ///
    /// The initial value comes from configuration and is validated there;
    /// this constructor does not re-validate.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial.into())),
        }
    }

    /// Returns the current role text
    pub async fn get(&self) -> String {
        self.inner.read().await.clone()
    }

    /// Replaces the role text for all subsequent turns.
    ///
    /// Empty or whitespace-only replacements are rejected.
    pub async fn set(&self, role: impl Into<String>) -> Result<()> {
        let role = role.into();
        if role.trim().is_empty() {
            return Err(GatewayError::invalid_input(
                "system role must not be empty",
            ));
        }
        let mut guard = self.inner.write().await;
        *guard = role;
        Ok(())
    }
}
