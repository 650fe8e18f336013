use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::InferenceEngine;
use crate::session::types::{ContextSlot, Session, SessionSnapshot, SessionSummary};
use crate::utils::{GatewayError, Result};

/// Owns the mapping from session id to conversation state.
///
/// All mutable state lives behind one `RwLock`; locks are held briefly and
/// never across engine I/O. Engine contexts are released through their
/// per-session slot (see `ContextSlot`), which is what makes `delete` safe
/// to call while the execution lane is mid-turn on the same session.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    engine: Arc<dyn InferenceEngine>,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(engine: Arc<dyn InferenceEngine>, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            engine,
            max_sessions,
        }
    }

    /// Creates a session, allocating a fresh engine context for it.
    ///
    /// Caller-supplied ids are accepted as-is (no namespacing), which makes
    /// the id space user-controlled; collisions surface as `DuplicateId`.
    /// Without an explicit id a UUID v4 is generated.
    pub async fn create(&self, requested: Option<String>) -> Result<String> {
        // Fast-fail before paying for an engine allocation
        {
            let guard = self.sessions.read().await;
            if guard.len() >= self.max_sessions {
                return Err(GatewayError::capacity_exceeded(self.max_sessions));
            }
            if let Some(id) = &requested {
                if guard.contains_key(id) {
                    return Err(GatewayError::duplicate_id(id.clone()));
                }
            }
        }

        let context = self.engine.create_context().await?;
        let id = requested.unwrap_or_else(|| Uuid::new_v4().to_string());
        let session = Session::new(id.clone(), context);

        // The ceiling and duplicate checks are decided atomically with the
        // insert; a racer that loses here must give its context back.
        let lost = {
            let mut guard = self.sessions.write().await;
            if guard.len() >= self.max_sessions {
                Some((session, GatewayError::capacity_exceeded(self.max_sessions)))
            } else if guard.contains_key(&id) {
                Some((session, GatewayError::duplicate_id(id.clone())))
            } else {
                guard.insert(id.clone(), session);
                None
            }
        };

        if let Some((session, err)) = lost {
            Self::release_context(&session.context, &session.id).await;
            return Err(err);
        }

        let live = self.len().await;
        debug!(session_id = %id, live = live, "Session created");
        Ok(id)
    }

    /// Returns a point-in-time copy of the session's metadata and history
    pub async fn get(&self, id: &str) -> Result<SessionSnapshot> {
        let guard = self.sessions.read().await;
        guard
            .get(id)
            .map(|s| s.snapshot())
            .ok_or_else(|| GatewayError::not_found(id))
    }

    /// Hands the execution lane the context slot for a session.
    ///
    /// The returned `Arc` keeps the slot alive across the engine call even
    /// if the session is deleted meanwhile; the slot's mutex is what keeps
    /// the lane and `delete` off the context at the same time.
    pub(crate) async fn context_slot(&self, id: &str) -> Result<ContextSlot> {
        let guard = self.sessions.read().await;
        guard
            .get(id)
            .map(|s| Arc::clone(&s.context))
            .ok_or_else(|| GatewayError::not_found(id))
    }

    /// Appends a completed turn and bumps `last_activity`.
    ///
    /// Fails with `NotFound` if the session vanished between request
    /// submission and processing.
    pub async fn append_turn(
        &self,
        id: &str,
        user_msg: impl Into<String>,
        assistant_msg: impl Into<String>,
    ) -> Result<()> {
        let mut guard = self.sessions.write().await;
        match guard.get_mut(id) {
            Some(session) => {
                session.append_turn(user_msg, assistant_msg);
                Ok(())
            }
            None => Err(GatewayError::not_found(id)),
        }
    }

    /// Deletes a session and releases its engine context.
    ///
    /// The map entry is removed first, so new lookups fail `NotFound`
    /// immediately; the context release then waits on the slot for any
    /// in-flight engine call. A release failure is logged and swallowed;
    /// the entry is gone either way, so an unreleasable context can never
    /// pin a slot against the ceiling.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let session = {
            let mut guard = self.sessions.write().await;
            guard.remove(id).ok_or_else(|| GatewayError::not_found(id))?
        };

        Self::release_context(&session.context, id).await;
        let live = self.len().await;
        info!(session_id = %id, live = live, "Session deleted");
        Ok(())
    }

    /// Read-only snapshot of live sessions; iteration order is map order
    pub async fn list(&self) -> Vec<SessionSummary> {
        let guard = self.sessions.read().await;
        guard.values().map(|s| s.summary()).collect()
    }

    /// Ids of sessions idle longer than `max_age`
    pub async fn stale_ids(&self, max_age: Duration) -> Vec<String> {
        let now = Utc::now();
        let guard = self.sessions.read().await;
        guard
            .values()
            .filter(|s| now.signed_duration_since(s.last_activity) > max_age)
            .map(|s| s.id.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Configured concurrent-session ceiling
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Releases every remaining context. Called once at daemon shutdown.
    pub async fn shutdown(&self) {
        let drained: Vec<Session> = {
            let mut guard = self.sessions.write().await;
            guard.drain().map(|(_, session)| session).collect()
        };

        let count = drained.len();
        for session in drained {
            Self::release_context(&session.context, &session.id).await;
        }
        info!(released = count, "Session store shut down");
    }

    /// Takes the context out of its slot and releases it, exactly once.
    ///
    /// Locking the slot waits out any engine call currently running on this
    /// context; `take` leaves a tombstoned (empty) slot behind for anyone
    /// still holding the `Arc`.
    async fn release_context(slot: &ContextSlot, id: &str) {
        let mut guard = slot.lock().await;
        if let Some(mut context) = guard.take() {
            if let Err(e) = context.release().await {
                warn!(session_id = %id, error = %e, "Engine context release failed");
            }
        }
    }

    /// Test hook: rewrite a session's `last_activity`
    #[cfg(test)]
    pub(crate) async fn set_last_activity(&self, id: &str, when: chrono::DateTime<Utc>) {
        let mut guard = self.sessions.write().await;
        if let Some(session) = guard.get_mut(id) {
            session.last_activity = when;
        }
    }
}
