use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use cadre_core::error::{CadreError, Result};
use cadre_core::types::SessionId;

use crate::state::ConversationState;

/// Latest conversation state per session.
pub trait CheckpointStore: Send + Sync + 'static {
    fn get<'a>(&'a self, session: &'a SessionId) -> BoxFuture<'a, Result<Option<ConversationState>>>;

    fn put<'a>(
        &'a self,
        session: &'a SessionId,
        state: &'a ConversationState,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Process-local store. Entries live until the process exits.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<HashMap<SessionId, ConversationState>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known session ids, sorted.
    pub fn list_sessions(&self) -> Result<Vec<SessionId>> {
        let entries = self.lock()?;
        let mut ids: Vec<SessionId> = entries.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SessionId, ConversationState>>> {
        self.entries
            .lock()
            .map_err(|e| CadreError::Checkpoint(e.to_string()))
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn get<'a>(&'a self, session: &'a SessionId) -> BoxFuture<'a, Result<Option<ConversationState>>> {
        Box::pin(async move { Ok(self.lock()?.get(session).cloned()) })
    }

    fn put<'a>(
        &'a self,
        session: &'a SessionId,
        state: &'a ConversationState,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.lock()?.insert(session.clone(), state.clone());
            Ok(())
        })
    }
}

/// One async lock per session so steps of the same session never interleave,
/// while different sessions proceed independently.
#[derive(Default)]
pub(crate) struct SessionLocks {
    locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub(crate) fn lock_for(&self, session: &SessionId) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| CadreError::Checkpoint(e.to_string()))?;
        Ok(locks.entry(session.clone()).or_default().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadre_core::types::Message;

    #[tokio::test]
    async fn test_absent_then_present() {
        let store = MemoryCheckpointStore::new();
        let session = SessionId::from_str("s1");
        assert!(store.get(&session).await.unwrap().is_none());

        let mut state = ConversationState::new();
        state.messages.push(Message::user("hi"));
        state.turn_counts.insert("A".into(), 1);
        store.put(&session, &state).await.unwrap();

        assert_eq!(store.get(&session).await.unwrap(), Some(state));
        assert_eq!(store.list_sessions().unwrap(), vec![session]);
    }

    #[tokio::test]
    async fn test_put_replaces_latest() {
        let store = MemoryCheckpointStore::new();
        let session = SessionId::from_str("s1");
        let mut state = ConversationState::new();
        store.put(&session, &state).await.unwrap();
        state.messages.push(Message::user("again"));
        store.put(&session, &state).await.unwrap();
        assert_eq!(store.get(&session).await.unwrap().unwrap().messages.len(), 1);
    }

    #[test]
    fn test_session_locks_are_shared_per_id() {
        let locks = SessionLocks::default();
        let a1 = locks.lock_for(&SessionId::from_str("a")).unwrap();
        let a2 = locks.lock_for(&SessionId::from_str("a")).unwrap();
        let b = locks.lock_for(&SessionId::from_str("b")).unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
    }
}
