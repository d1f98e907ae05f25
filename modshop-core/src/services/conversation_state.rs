// File: modshop-core/src/services/conversation_state.rs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::services::dialog_state::ConversationState;

/// Time source, swappable so expiry can be tested without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where per-sender dialog state lives between webhook calls.
#[async_trait]
pub trait ConversationStateStore: Send + Sync {
    /// Returns `None` (and forgets the entry) once it has been idle for
    /// longer than the store's timeout.
    async fn get_state(&self, user_id: &str) -> Option<ConversationState>;
    /// Overwrites and stamps the current time.
    async fn set_state(&self, user_id: &str, state: ConversationState);
    async fn clear_state(&self, user_id: &str);
}

#[derive(Debug, Clone)]
struct StateEntry {
    state: ConversationState,
    updated_at: DateTime<Utc>,
}

/// Process-local store. Entries are only expired when read; nothing sweeps
/// in the background, and a restart loses every conversation.
pub struct InMemoryConversationStore {
    entries: DashMap<String, StateEntry>,
    idle_timeout: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl InMemoryConversationStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self::with_clock(idle_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(idle_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        let idle_timeout = chrono::Duration::from_std(idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));
        Self {
            entries: DashMap::new(),
            idle_timeout,
            clock,
        }
    }

    /// Whether an entry is physically held, expired or not.
    pub fn is_tracked(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ConversationStateStore for InMemoryConversationStore {
    async fn get_state(&self, user_id: &str) -> Option<ConversationState> {
        let now = self.clock.now();
        let timeout = self.idle_timeout;
        // remove_if holds the shard lock, so a concurrent set is not lost.
        if self
            .entries
            .remove_if(user_id, |_, entry| now - entry.updated_at > timeout)
            .is_some()
        {
            debug!("Conversation state for {} expired", user_id);
            return None;
        }
        self.entries.get(user_id).map(|e| e.state.clone())
    }

    async fn set_state(&self, user_id: &str, state: ConversationState) {
        debug!("State for {} -> {:?}", user_id, state);
        self.entries.insert(
            user_id.to_string(),
            StateEntry {
                state,
                updated_at: self.clock.now(),
            },
        );
    }

    async fn clear_state(&self, user_id: &str) {
        if self.entries.remove(user_id).is_some() {
            debug!("Cleared state for {}", user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dialog_state::UserState;
    use crate::test_utils::ManualClock;

    fn store(clock: Arc<ManualClock>) -> InMemoryConversationStore {
        InMemoryConversationStore::with_clock(Duration::from_secs(30 * 60), clock)
    }

    #[tokio::test]
    async fn entry_survives_until_timeout() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = store(clock.clone());
        store.set_state("u1", UserState::AwaitingRefForCheck.into()).await;

        clock.advance(chrono::Duration::minutes(30));
        assert_eq!(
            store.get_state("u1").await,
            Some(ConversationState::User(UserState::AwaitingRefForCheck))
        );
    }

    #[tokio::test]
    async fn expired_entry_is_removed_lazily_on_read() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = store(clock.clone());
        store.set_state("u1", UserState::AwaitingWantMod.into()).await;

        clock.advance(chrono::Duration::minutes(30) + chrono::Duration::seconds(1));
        // Nothing sweeps: still physically present until somebody reads it.
        assert!(store.is_tracked("u1"));
        assert_eq!(store.get_state("u1").await, None);
        assert!(!store.is_tracked("u1"));

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(store.get_state("u1").await, None);
    }

    #[tokio::test]
    async fn set_refreshes_the_timestamp() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = store(clock.clone());
        store.set_state("u1", UserState::AwaitingWantMod.into()).await;
        clock.advance(chrono::Duration::minutes(20));
        store.set_state("u1", UserState::AwaitingRefForCheck.into()).await;
        clock.advance(chrono::Duration::minutes(20));

        assert!(store.get_state("u1").await.is_some());
    }

    #[tokio::test]
    async fn clear_removes_immediately() {
        let store = InMemoryConversationStore::new(Duration::from_secs(60));
        store.set_state("u1", UserState::AwaitingAdminMessage.into()).await;
        store.clear_state("u1").await;
        assert!(store.is_empty());
    }
}
