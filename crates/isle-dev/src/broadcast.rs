//! Update broadcaster.
//!
//! Tracks connected browser sessions and pushes JSON update messages to
//! them. A session is either connected (present in the map) or gone; there
//! is no replay for sessions that connect after an event.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Identifier handed out by [`Broadcaster::register`].
pub type SessionId = u64;

/// Message pushed to browser sessions.
///
/// Serializes to `{"type":"reload"}`, `{"type":"update","path":…}` or
/// `{"type":"error","message":…,"stack":…}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UpdateEvent {
    /// Reload the whole page
    #[serde(rename = "reload")]
    FullReload,

    /// A module changed and the client bundle was rebuilt
    #[serde(rename = "update")]
    ModuleUpdate { path: String },

    /// A render or transform failed
    #[serde(rename = "error")]
    RuntimeError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
}

impl UpdateEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// An open push channel to one browser.
#[derive(Debug, Clone)]
pub struct DevSession {
    sender: mpsc::Sender<String>,
}

impl DevSession {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self { sender }
    }

    /// A session plus the receiving end the transport drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

/// Fan-out of update events to every connected session.
#[derive(Debug)]
pub struct Broadcaster {
    sessions: RwLock<HashMap<SessionId, DevSession>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Broadcaster {
    /// `capacity` bounds how many undelivered messages a session may queue
    /// before it is considered dead.
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity,
        }
    }

    pub fn register(&self, session: DevSession) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions.write().insert(id, session);
        tracing::debug!(session = id, "session connected");
        id
    }

    /// Creates and registers a session in one step.
    pub fn connect(&self) -> (SessionId, mpsc::Receiver<String>) {
        let (session, rx) = DevSession::channel(self.capacity);
        (self.register(session), rx)
    }

    pub fn unregister(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().remove(&id).is_some();
        if removed {
            tracing::debug!(session = id, "session disconnected");
        }
        removed
    }

    /// Sends `event` to every session, returning how many accepted it.
    ///
    /// Sessions whose channel is closed or full are unregistered; the rest
    /// still receive the event.
    pub fn broadcast(&self, event: &UpdateEvent) -> usize {
        let json = event.to_json();
        let sessions: Vec<(SessionId, DevSession)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, session)| (*id, session.clone()))
            .collect();

        let mut delivered = 0;
        let mut failed_ids = Vec::new();
        for (id, session) in sessions {
            match session.sender.try_send(json.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(session = id, "dropping session: {}", e);
                    failed_ids.push(id);
                }
            }
        }

        for id in failed_ids {
            self.unregister(id);
        }
        tracing::trace!(delivered, event = %json, "broadcast");
        delivered
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}
