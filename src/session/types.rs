use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::engine::EngineContext;

/// Shared slot holding a session's engine context.
///
/// The slot outlives the store entry: the execution lane keeps an `Arc` to
/// it across an engine call, so deleting the session cannot free the
/// context out from under an in-flight turn. `Option::take` makes release
/// exactly-once.
pub type ContextSlot = Arc<Mutex<Option<Box<dyn EngineContext>>>>;

/// Role of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Client-submitted message
    User,
    /// Engine response
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One history entry of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A live session owned by the store
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub history: Vec<Turn>,
    pub(crate) context: ContextSlot,
}

impl Session {
    /// Creates an empty session owning the given engine context
    pub fn new(id: String, context: Box<dyn EngineContext>) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_activity: now,
            history: Vec::new(),
            context: Arc::new(Mutex::new(Some(context))),
        }
    }

    /// Appends one completed turn (user message then assistant response)
    /// and bumps `last_activity`.
    ///
    /// The user entry is pushed before the assistant entry so history
    /// stays causally ordered.
    pub fn append_turn(&mut self, user_msg: impl Into<String>, assistant_msg: impl Into<String>) {
        self.history.push(Turn::new(TurnRole::User, user_msg));
        self.history.push(Turn::new(TurnRole::Assistant, assistant_msg));
        self.last_activity = Utc::now();
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            message_count: self.history.len(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            history: self.history.clone(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("last_activity", &self.last_activity)
            .field("history_len", &self.history.len())
            .finish()
    }
}

/// Listing row for a live session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
}

/// Point-in-time copy of a session's metadata and history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub history: Vec<Turn>,
}
