use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod handlers;
pub mod message_types;

/// Identifies one live connection within a user's channel set, so
/// disconnect cleanup removes exactly that connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

struct Session {
    id: SessionId,
    sender: UnboundedSender<String>,
}

/// Process-local channel membership: user id -> currently open live
/// connections. Rebuilt from scratch on restart; delivery is best-effort
/// and at-most-once per connection, with durability left to the stores.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Vec<Session>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under `user_id`. A user may hold any number of
    /// simultaneous sessions (multi-device); each receives every broadcast
    /// addressed to that user.
    pub async fn join(&self, user_id: Uuid) -> (SessionId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let session = Session {
            id: SessionId::new(),
            sender: tx,
        };
        let session_id = session.id;

        let mut guard = self.inner.write().await;
        guard.entry(user_id).or_default().push(session);
        tracing::debug!(
            user = %user_id,
            sessions = guard.get(&user_id).map(|v| v.len()).unwrap_or(0),
            "live session registered"
        );
        (session_id, rx)
    }

    /// Remove one connection. The channel set may become empty; empty
    /// entries are dropped so the map does not accumulate departed users.
    pub async fn leave(&self, user_id: Uuid, session_id: SessionId) {
        let mut guard = self.inner.write().await;
        if let Some(sessions) = guard.get_mut(&user_id) {
            sessions.retain(|s| s.id != session_id);
            if sessions.is_empty() {
                guard.remove(&user_id);
            }
        }
    }

    /// Fan one payload out to every registered connection of every listed
    /// user. Users with zero connections are skipped silently; senders whose
    /// receiving task is gone are pruned as they fail.
    pub async fn broadcast(&self, user_ids: &[Uuid], payload: &str) {
        let mut guard = self.inner.write().await;
        for user_id in user_ids {
            if let Some(sessions) = guard.get_mut(user_id) {
                sessions.retain(|s| s.sender.send(payload.to_string()).is_ok());
                if sessions.is_empty() {
                    guard.remove(user_id);
                }
            }
        }
    }

    pub async fn session_count(&self, user_id: Uuid) -> usize {
        let guard = self.inner.read().await;
        guard.get(&user_id).map(|v| v.len()).unwrap_or(0)
    }
}
