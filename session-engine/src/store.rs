use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::state::SessionState;

/// Exclusive handle to one session. Holding the lock serialises requests
/// for that session id.
pub type SessionHandle = Arc<Mutex<SessionState>>;

/// Maps session ids to isolated session states. Entries are created on first
/// use and removed on reset; distinct sessions never contend on each other's
/// locks.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    keep_history: usize,
}

impl SessionStore {
    pub fn new(keep_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            keep_history,
        }
    }

    pub async fn get_or_create(&self, session_id: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(session_id) {
            return Arc::clone(handle);
        }

        let mut sessions = self.sessions.write().await;
        let handle = sessions.entry(session_id.to_owned()).or_insert_with(|| {
            debug!(session_id, "creating session");
            Arc::new(Mutex::new(SessionState::new(self.keep_history)))
        });
        Arc::clone(handle)
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).map(Arc::clone)
    }

    /// Drops the session. The next request starts from a fresh state.
    /// Returns whether a session existed.
    pub async fn reset(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        debug!(session_id, removed, "session reset");
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(crate::state::KEEP_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WeaknessSignal;

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::default();
        store
            .get_or_create("alice")
            .await
            .lock()
            .await
            .apply_signal("algebra", WeaknessSignal::Mistake);

        let bob = store.get_or_create("bob").await;
        assert!(bob.lock().await.weakness_scores.is_empty());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn same_id_returns_same_session() {
        let store = SessionStore::default();
        let first = store.get_or_create("s").await;
        let second = store.get_or_create("s").await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn reset_is_idempotent_and_yields_fresh_state() {
        let store = SessionStore::new(4);
        store
            .get_or_create("s")
            .await
            .lock()
            .await
            .push_turn("hi", "hello");

        assert!(store.reset("s").await);
        assert!(!store.reset("s").await);
        assert!(store.get("s").await.is_none());

        let fresh = store.get_or_create("s").await;
        assert_eq!(*fresh.lock().await, SessionState::new(4));
    }

    #[tokio::test]
    async fn concurrent_turns_on_one_session_are_serialised() {
        let store = Arc::new(SessionStore::default());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                let handle = store.get_or_create("shared").await;
                let mut state = handle.lock().await;
                let before = state.interaction_count;
                tokio::task::yield_now().await;
                state.interaction_count = before + 1;
            }));
        }
        for task in tasks {
            task.await.expect("task");
        }

        let handle = store.get_or_create("shared").await;
        assert_eq!(handle.lock().await.interaction_count, 16);
    }
}
