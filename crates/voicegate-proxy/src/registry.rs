//! Live session registry.

use crate::frame::close_code;
use crate::lifecycle::SessionState;
use crate::session::Session;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Point-in-time view of a live session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Session ID.
    pub id: String,

    /// Client peer, once relaying.
    pub peer: Option<String>,

    /// Lifecycle state.
    pub state: SessionState,

    /// Creation timestamp.
    pub started_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id().to_string(),
            peer: session.peer(),
            state: session.state(),
            started_at: session.started_at(),
        }
    }
}

/// Registry of live proxy sessions.
pub struct SessionRegistry {
    /// Active sessions.
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create a new session registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session.
    pub async fn register(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id().to_string(), session);
    }

    /// Remove a session.
    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id)
    }

    /// Summaries of all sessions, oldest first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<_> = sessions.values().map(|s| SessionSummary::from(s.as_ref())).collect();
        summaries.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    /// Get session count.
    pub async fn count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Close every registered session as going away and wait for each
    /// teardown to finish.
    pub async fn close_all(&self) {
        let sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
        for session in sessions {
            session
                .close_with(close_code::GOING_AWAY, "server shutting down")
                .await;
        }
    }
}
