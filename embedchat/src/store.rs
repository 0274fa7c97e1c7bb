//! In-memory session store with passive expiry.
//!
//! Sessions live only for the process lifetime. Each store operation
//! takes the map lock once, so individual operations are atomic, but a
//! handler's read-append-save sequence spans an await on the upstream
//! call and can interleave with another request for the same session
//! identifier. Sessions are assumed single-client and low-concurrency;
//! the store does not serialize mutations per identifier.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::models::ChatSession;

/// Sessions idle longer than this are removed by the expiry sweep.
pub const SESSION_MAX_IDLE: Duration = Duration::hours(1);

/// Process-local session map. Owned by the server state and handed to
/// handlers by reference; never a global.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, ChatSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a session by identifier.
    pub async fn get(&self, session_id: &str) -> Option<ChatSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Return the stored session for `session_id`, or a fresh empty one.
    ///
    /// A fresh session is *not* inserted here; it only reaches the map
    /// via `save`. Two concurrent calls with the same unseen identifier
    /// each get their own fresh session and the last `save` wins.
    pub async fn get_or_create(&self, session_id: &str) -> ChatSession {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| ChatSession::new(session_id))
    }

    /// Upsert a session under its identifier, bumping `last_activity`.
    pub async fn save(&self, mut session: ChatSession) {
        session.last_activity = Utc::now();
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
    }

    /// Remove every session idle longer than `max_idle`. Returns the
    /// number of sessions removed.
    ///
    /// Called opportunistically after successful AI-backed responses
    /// rather than on a timer, so a quiet deployment holds stale
    /// sessions until the next chat event anywhere triggers a sweep.
    pub async fn sweep_expired(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_activity >= cutoff);
        before - sessions.len()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Insert a session verbatim, without touching `last_activity`.
    /// Lets tests stage sessions with arbitrary activity timestamps.
    #[cfg(test)]
    pub(crate) async fn insert_raw(&self, session: ChatSession) {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;

    #[tokio::test]
    async fn get_or_create_returns_fresh_until_saved() {
        let store = SessionStore::new();

        let session = store.get_or_create("s1").await;
        assert!(session.messages.is_empty());
        assert!(store.get("s1").await.is_none());

        store.save(session).await;
        assert!(store.get("s1").await.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn save_bumps_last_activity() {
        let store = SessionStore::new();

        let mut session = store.get_or_create("s1").await;
        let created = session.last_activity;
        session.append(MessageRole::User, "hello");
        store.save(session).await;

        let saved = store.get("s1").await.unwrap();
        assert_eq!(saved.messages.len(), 1);
        assert!(saved.last_activity >= created);
    }

    #[tokio::test]
    async fn unsaved_writers_race_last_write_wins() {
        let store = SessionStore::new();

        let mut first = store.get_or_create("s1").await;
        let mut second = store.get_or_create("s1").await;

        first.append(MessageRole::User, "from first");
        second.append(MessageRole::User, "from second");

        store.save(first).await;
        store.save(second).await;

        let stored = store.get("s1").await.unwrap();
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(stored.messages[0].content, "from second");
    }

    #[tokio::test]
    async fn sweep_removes_exactly_expired_sessions() {
        let store = SessionStore::new();

        let mut stale = ChatSession::new("stale");
        stale.last_activity = Utc::now() - Duration::hours(2);
        store.insert_raw(stale).await;

        store.save(ChatSession::new("fresh")).await;

        let removed = store.sweep_expired(SESSION_MAX_IDLE).await;
        assert_eq!(removed, 1);
        assert!(store.get("stale").await.is_none());
        assert!(store.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn sweep_on_empty_store_is_a_no_op() {
        let store = SessionStore::new();
        assert_eq!(store.sweep_expired(SESSION_MAX_IDLE).await, 0);
        assert!(store.is_empty().await);
    }
}
